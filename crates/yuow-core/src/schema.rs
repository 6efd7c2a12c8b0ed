//! Declarative entity configuration.
//!
//! A `Schema` pairs a property map with a table, identity paths and an
//! optional version column, and manufactures the matching data mapper and
//! repository constructor.

use crate::errors::{Result, UowError};
use crate::mapper::{EntityDataMapper, Entity};
use crate::path::PropertyPath;
use crate::property::{BoundProperty, PropertyMap};
use crate::repository::RepositoryConstructor;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::marker::PhantomData;
use std::sync::Arc;

pub const DEFAULT_VERSION_COLUMN: &str = "version";

/// Optimistic version column declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionColumn {
    /// Column named `version`
    Default,
    Named(String),
}

impl VersionColumn {
    pub fn name(&self) -> &str {
        match self {
            VersionColumn::Default => DEFAULT_VERSION_COLUMN,
            VersionColumn::Named(name) => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaOptions {
    pub table: String,
    /// One path, or several for a composite identity, in key order
    pub identity: Vec<String>,
    pub version: Option<VersionColumn>,
}

impl SchemaOptions {
    pub fn new(table: impl Into<String>, identity: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            identity: vec![identity.into()],
            version: None,
        }
    }

    pub fn composite<I, P>(table: impl Into<String>, identity: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        Self {
            table: table.into(),
            identity: identity.into_iter().map(Into::into).collect(),
            version: None,
        }
    }

    /// Enable versioning on the default `version` column
    pub fn versioned(mut self) -> Self {
        self.version = Some(VersionColumn::Default);
        self
    }

    pub fn version_column(mut self, column: impl Into<String>) -> Self {
        self.version = Some(VersionColumn::Named(column.into()));
        self
    }
}

pub(crate) type BlankFactory = Arc<dyn Fn() -> Result<Value> + Send + Sync>;

/// Validated, type-erased schema shared by mappers
pub(crate) struct SchemaLayout {
    pub table: String,
    pub properties: Vec<BoundProperty>,
    /// Indexes into `properties`, in identity order
    pub identity: Vec<usize>,
    pub version_column: Option<String>,
    pub blank: BlankFactory,
}

impl SchemaLayout {
    pub fn identity_paths(&self) -> Vec<&str> {
        self.identity
            .iter()
            .map(|&index| self.properties[index].path.as_str())
            .collect()
    }
}

fn empty_object() -> BlankFactory {
    Arc::new(|| Ok(Value::Object(Map::new())))
}

pub struct Schema<E> {
    layout: Arc<SchemaLayout>,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for Schema<E> {
    fn clone(&self) -> Self {
        Self {
            layout: Arc::clone(&self.layout),
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> Schema<E> {
    /// Validate a declaration
    ///
    /// # Errors
    ///
    /// Returns `UowError::Config` for an empty table, unparsable or duplicate
    /// paths, duplicate columns, identity paths that are not declared
    /// properties, or a version column that clashes with a property column.
    pub fn new(properties: PropertyMap, options: SchemaOptions) -> Result<Self> {
        if options.table.trim().is_empty() {
            return Err(UowError::config("table name is empty"));
        }

        let mut bound = Vec::with_capacity(properties.len());
        let mut seen_paths = HashSet::new();
        let mut seen_columns = HashSet::new();
        for (raw, property) in properties.entries() {
            let path = PropertyPath::parse(raw)
                .map_err(|e| UowError::config(format!("invalid property path: {e}")))?;
            if !seen_paths.insert(raw.clone()) {
                return Err(UowError::config(format!("path '{raw}' is declared twice")));
            }
            if !seen_columns.insert(property.name().to_string()) {
                return Err(UowError::config(format!(
                    "column '{}' is mapped by more than one path",
                    property.name()
                )));
            }
            bound.push(BoundProperty {
                path,
                property: Arc::clone(property),
            });
        }

        if options.identity.is_empty() {
            return Err(UowError::config("identity declares no paths"));
        }
        let identity = options
            .identity
            .iter()
            .map(|raw| {
                bound
                    .iter()
                    .position(|b| b.path.as_str() == raw)
                    .ok_or_else(|| {
                        UowError::config(format!("identity path '{raw}' is not a declared property"))
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        let version_column = options.version.as_ref().map(|v| v.name().to_string());
        if let Some(column) = &version_column {
            if seen_columns.contains(column) {
                return Err(UowError::config(format!(
                    "version column '{column}' clashes with a property column"
                )));
            }
        }

        Ok(Self {
            layout: Arc::new(SchemaLayout {
                table: options.table,
                properties: bound,
                identity,
                version_column,
                blank: empty_object(),
            }),
            _entity: PhantomData,
        })
    }

    /// Use `factory` to build the blank image that hydration writes into
    pub fn with_blank<F>(self, factory: F) -> Self
    where
        F: Fn() -> E + Send + Sync + 'static,
    {
        self.with_blank_image(move || Ok(serde_json::to_value(factory())?))
    }

    fn with_blank_image<F>(self, factory: F) -> Self
    where
        F: Fn() -> Result<Value> + Send + Sync + 'static,
    {
        let layout = &self.layout;
        Self {
            layout: Arc::new(SchemaLayout {
                table: layout.table.clone(),
                properties: layout.properties.clone(),
                identity: layout.identity.clone(),
                version_column: layout.version_column.clone(),
                blank: Arc::new(factory),
            }),
            _entity: PhantomData,
        }
    }

    pub fn table(&self) -> &str {
        &self.layout.table
    }

    pub fn version_column(&self) -> Option<&str> {
        self.layout.version_column.as_deref()
    }

    /// Stored columns in declaration order, version column last
    pub fn columns(&self) -> Vec<&str> {
        self.layout
            .properties
            .iter()
            .map(BoundProperty::column)
            .chain(self.layout.version_column.as_deref())
            .collect()
    }

    pub fn create_data_mapper(&self) -> EntityDataMapper<E> {
        EntityDataMapper::new(Arc::clone(&self.layout))
    }

    pub fn create_repository(&self) -> EntityRepository<E> {
        EntityRepository {
            schema: self.clone(),
        }
    }
}

impl<E: Entity + Default> Schema<E> {
    /// Hydrate into `E::default()`'s image
    pub fn with_default_blank(self) -> Self {
        self.with_blank(E::default)
    }
}

/// Repository constructor produced by a `Schema`
pub struct EntityRepository<E> {
    schema: Schema<E>,
}

impl<E> Clone for EntityRepository<E> {
    fn clone(&self) -> Self {
        Self {
            schema: self.schema.clone(),
        }
    }
}

impl<E: Entity> RepositoryConstructor<E> for EntityRepository<E> {
    type Mapper = EntityDataMapper<E>;

    fn repository_name(&self) -> &str {
        self.schema.table()
    }

    fn data_mapper(&self) -> Self::Mapper {
        self.schema.create_data_mapper()
    }
}
