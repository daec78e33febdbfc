//! Record operations on one model
//!
//! Thin wrappers over [`Session::execute_kw`]. Domains, field lists and
//! values are passed through as-is. Records can be checked locally first
//! with a [`FieldMapper`] built from the model's field definitions.

use odoorpc_common::protocol::error::{Result, RpcError};
use odoorpc_common::protocol::{Struct, Value};

use crate::fields::FieldMapper;
use crate::session::Session;

/// Paging and ordering for `search` and `search_read`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchOptions {
    pub offset: Option<u32>,
    pub limit: Option<u32>,
    pub order: Option<String>,
}

impl SearchOptions {
    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn order(mut self, order: impl Into<String>) -> Self {
        self.order = Some(order.into());
        self
    }

    fn apply(&self, kwargs: &mut Struct) {
        if let Some(offset) = self.offset {
            kwargs.insert("offset".to_string(), Value::from(offset));
        }
        if let Some(limit) = self.limit {
            kwargs.insert("limit".to_string(), Value::from(limit));
        }
        if let Some(order) = &self.order {
            kwargs.insert("order".to_string(), Value::from(order.as_str()));
        }
    }
}

/// One domain term, e.g. `term("name", "ilike", "acme")`
pub fn term(field: &str, operator: &str, value: impl Into<Value>) -> Value {
    Value::Array(vec![Value::from(field), Value::from(operator), value.into()])
}

fn ids_value(ids: &[i64]) -> Value {
    Value::Array(ids.iter().copied().map(Value::Int).collect())
}

fn fields_value(fields: &[&str]) -> Value {
    Value::Array(fields.iter().map(|f| Value::from(*f)).collect())
}

/// Model handle borrowed from a [`Session`]
#[derive(Debug, Clone)]
pub struct Model<'a> {
    session: &'a Session,
    name: String,
}

impl<'a> Model<'a> {
    pub(crate) fn new(session: &'a Session, name: impl Into<String>) -> Self {
        Self {
            session,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Calls any method of the model, e.g. `action_confirm`
    pub async fn call(&self, method: &str, args: Vec<Value>, kwargs: Struct) -> Result<Value> {
        self.session.execute_kw(&self.name, method, args, kwargs).await
    }

    /// Field definitions wrapped for validating and coercing records
    pub async fn field_mapper(&self) -> Result<FieldMapper> {
        Ok(FieldMapper::new(self.fields_get(&[]).await?))
    }

    fn unexpected(&self, method: &str, got: &Value) -> RpcError {
        RpcError::generic(format!(
            "Unexpected result from {}.{}: {:?}",
            self.name, method, got
        ))
    }

    /// Creates one record and returns its id
    pub async fn create(&self, values: Struct) -> Result<i64> {
        let result = self
            .call("create", vec![Value::Struct(values)], Struct::new())
            .await?;
        // Some versions answer a single create with a one-element list
        match &result {
            Value::Int(id) => Ok(*id),
            Value::Array(items) if items.len() == 1 => {
                items[0].as_i64().ok_or_else(|| self.unexpected("create", &result))
            }
            _ => Err(self.unexpected("create", &result)),
        }
    }

    /// Reads `fields` of `ids`; an empty field list reads every field
    pub async fn read(&self, ids: &[i64], fields: &[&str]) -> Result<Vec<Struct>> {
        let mut kwargs = Struct::new();
        if !fields.is_empty() {
            kwargs.insert("fields".to_string(), fields_value(fields));
        }

        let result = self.call("read", vec![ids_value(ids)], kwargs).await?;
        self.records("read", result)
    }

    pub async fn write(&self, ids: &[i64], values: Struct) -> Result<bool> {
        let result = self
            .call("write", vec![ids_value(ids), Value::Struct(values)], Struct::new())
            .await?;
        result.as_bool().ok_or_else(|| self.unexpected("write", &result))
    }

    pub async fn unlink(&self, ids: &[i64]) -> Result<bool> {
        let result = self
            .call("unlink", vec![ids_value(ids)], Struct::new())
            .await?;
        result.as_bool().ok_or_else(|| self.unexpected("unlink", &result))
    }

    /// Ids of the records matching `domain`
    pub async fn search(&self, domain: Vec<Value>, options: &SearchOptions) -> Result<Vec<i64>> {
        let mut kwargs = Struct::new();
        options.apply(&mut kwargs);

        let result = self
            .call("search", vec![Value::Array(domain)], kwargs)
            .await?;

        let ids = result
            .as_array()
            .ok_or_else(|| self.unexpected("search", &result))?;
        ids.iter()
            .map(|id| id.as_i64().ok_or_else(|| self.unexpected("search", &result)))
            .collect()
    }

    pub async fn search_read(
        &self,
        domain: Vec<Value>,
        fields: &[&str],
        options: &SearchOptions,
    ) -> Result<Vec<Struct>> {
        let mut kwargs = Struct::new();
        if !fields.is_empty() {
            kwargs.insert("fields".to_string(), fields_value(fields));
        }
        options.apply(&mut kwargs);

        let result = self
            .call("search_read", vec![Value::Array(domain)], kwargs)
            .await?;
        self.records("search_read", result)
    }

    pub async fn search_count(&self, domain: Vec<Value>) -> Result<i64> {
        let result = self
            .call("search_count", vec![Value::Array(domain)], Struct::new())
            .await?;
        result
            .as_i64()
            .ok_or_else(|| self.unexpected("search_count", &result))
    }

    /// Field definitions keyed by field name
    ///
    /// `attributes` limits which properties of each field are returned
    /// (e.g. `["string", "type"]`); empty means all.
    pub async fn fields_get(&self, attributes: &[&str]) -> Result<Struct> {
        let mut kwargs = Struct::new();
        if !attributes.is_empty() {
            kwargs.insert("attributes".to_string(), fields_value(attributes));
        }

        let result = self.call("fields_get", vec![], kwargs).await?;
        match result {
            Value::Struct(fields) => Ok(fields),
            other => Err(self.unexpected("fields_get", &other)),
        }
    }

    fn records(&self, method: &str, result: Value) -> Result<Vec<Struct>> {
        match result {
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::Struct(record) => Ok(record),
                    other => Err(self.unexpected(method, &other)),
                })
                .collect(),
            other => Err(self.unexpected(method, &other)),
        }
    }
}
