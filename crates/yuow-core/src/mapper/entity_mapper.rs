use super::{DataMapper, Entity, Hydrated};
use crate::errors::{Result, UowError};
use crate::identity::Identity;
use crate::path::{extract, put};
use crate::property::BoundProperty;
use crate::provider::Executor;
use crate::query::{Filter, Order, Record, Select};
use crate::schema::SchemaLayout;
use crate::version::VersionStamp;
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

/// Schema-driven data mapper
pub struct EntityDataMapper<E> {
    layout: Arc<SchemaLayout>,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for EntityDataMapper<E> {
    fn clone(&self) -> Self {
        Self {
            layout: Arc::clone(&self.layout),
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> EntityDataMapper<E> {
    pub(crate) fn new(layout: Arc<SchemaLayout>) -> Self {
        Self {
            layout,
            _entity: PhantomData,
        }
    }

    pub fn table(&self) -> &str {
        &self.layout.table
    }

    fn image(entity: &E) -> Result<Value> {
        Ok(serde_json::to_value(entity)?)
    }

    /// Every declared property, transformed to its stored form
    fn to_record(&self, entity: &E) -> Result<Record> {
        let image = Self::image(entity)?;
        let mut record = Record::new();
        for bound in &self.layout.properties {
            let value = extract(&image, &bound.path)?.cloned().unwrap_or(Value::Null);
            record.insert(bound.column().to_string(), bound.property.to_stored(value)?);
        }
        Ok(record)
    }

    fn identity_properties(&self) -> impl Iterator<Item = &BoundProperty> {
        self.layout
            .identity
            .iter()
            .map(|&index| &self.layout.properties[index])
    }

    /// Identity filter built from already stored values
    fn identity_filter(&self, record: &Record) -> Filter {
        self.identity_properties().fold(Filter::new(), |filter, bound| {
            let value = record.get(bound.column()).cloned().unwrap_or(Value::Null);
            filter.eq(bound.column(), value)
        })
    }

    fn hydrate(&self, record: &Record) -> Result<Hydrated<E>> {
        let mut image = (self.layout.blank)()?;
        for bound in &self.layout.properties {
            if let Some(stored) = record.get(bound.column()) {
                put(&mut image, &bound.path, bound.property.from_stored(stored.clone())?)?;
            }
        }

        let version = match &self.layout.version_column {
            Some(column) => {
                let raw = record.get(column).ok_or_else(|| UowError::InvalidRecord {
                    table: self.layout.table.clone(),
                    reason: format!("missing version column '{column}'"),
                })?;
                let value = raw.as_u64().ok_or_else(|| UowError::InvalidRecord {
                    table: self.layout.table.clone(),
                    reason: format!("version column '{column}' holds {raw}, expected an integer"),
                })?;
                VersionStamp::loaded(value)
            }
            None => VersionStamp::new(),
        };

        Ok(Hydrated {
            entity: serde_json::from_value(image)?,
            version,
        })
    }

    fn select(&self, filter: &Filter) -> Select {
        self.identity_properties().fold(
            Select::from(self.layout.table.clone()).filter(filter.clone()),
            |select, bound| select.order_by(bound.column(), Order::Asc),
        )
    }
}

impl<E: Entity> DataMapper<E> for EntityDataMapper<E> {
    fn identity(&self, entity: &E) -> Result<Identity> {
        let image = Self::image(entity)?;
        let parts = self
            .identity_properties()
            .map(|bound| match extract(&image, &bound.path)? {
                Some(value) if !value.is_null() => Ok(value.clone()),
                _ => Err(UowError::path(bound.path.as_str(), "identity value is missing")),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Identity::from_parts(parts))
    }

    fn insert(&self, exec: &dyn Executor, entity: &E, version: &mut VersionStamp) -> Result<bool> {
        let mut record = self.to_record(entity)?;
        if let Some(column) = &self.layout.version_column {
            record.insert(column.clone(), Value::from(version.current()));
        }
        let affected = exec.insert(&self.layout.table, &record)?;
        debug!(table = %self.layout.table, affected, "mapper insert");
        Ok(affected > 0)
    }

    fn update(&self, exec: &dyn Executor, entity: &E, version: &mut VersionStamp) -> Result<bool> {
        let mut record = self.to_record(entity)?;
        let mut filter = self.identity_filter(&record);
        if let Some(column) = &self.layout.version_column {
            filter = filter.eq(column.clone(), version.current());
            record.insert(column.clone(), Value::from(version.next()));
        }

        let affected = exec.update(&self.layout.table, &record, &filter)?;
        debug!(table = %self.layout.table, affected, expected_version = version.current(), "mapper update");
        if affected == 0 {
            return Ok(false);
        }
        if self.layout.version_column.is_some() {
            version.set(version.next())?;
        }
        Ok(true)
    }

    fn delete(&self, exec: &dyn Executor, entity: &E, version: &VersionStamp) -> Result<bool> {
        let record = self.to_record(entity)?;
        let mut filter = self.identity_filter(&record);
        if let Some(column) = &self.layout.version_column {
            filter = filter.eq(column.clone(), version.current());
        }
        let affected = exec.delete(&self.layout.table, &filter)?;
        debug!(table = %self.layout.table, affected, "mapper delete");
        Ok(affected > 0)
    }

    fn find(&self, exec: &dyn Executor, filter: &Filter) -> Result<Option<Hydrated<E>>> {
        let rows = exec.select(&self.select(filter).limit(1))?;
        rows.first().map(|row| self.hydrate(row)).transpose()
    }

    fn find_all(&self, exec: &dyn Executor, filter: &Filter) -> Result<Vec<Hydrated<E>>> {
        exec.select(&self.select(filter))?
            .iter()
            .map(|row| self.hydrate(row))
            .collect()
    }

    fn find_by_identity(&self, exec: &dyn Executor, identity: &Identity) -> Result<Option<Hydrated<E>>> {
        let parts = identity.parts();
        if parts.len() != self.layout.identity.len() {
            return Err(UowError::path(
                self.layout.identity_paths().join(","),
                format!(
                    "identity has {} part(s), schema declares {}",
                    parts.len(),
                    self.layout.identity.len()
                ),
            ));
        }

        let mut filter = Filter::new();
        for (bound, part) in self.identity_properties().zip(parts) {
            filter = filter.eq(bound.column(), bound.property.to_stored(part.clone())?);
        }
        self.find(exec, &filter)
    }
}
