use serde::{Deserialize, Serialize};

/// A schema-bound view over one worksheet tab. Embedded in its project and
/// rebuilt on every sync; only `methods` survives a resync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    pub worksheet_name: String,
    pub endpoint_name: String,
    /// Normalized column names in column order. An empty entry marks a column
    /// whose header has no usable name; it keeps its position but maps to no field.
    pub schema: Vec<String>,
    #[serde(default)]
    pub methods: EndpointMethods,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointMethods {
    pub get: bool,
    pub get_one: bool,
    pub post: bool,
    pub put: bool,
    pub delete: bool,
}

impl Default for EndpointMethods {
    fn default() -> Self {
        Self {
            get: true,
            get_one: true,
            post: false,
            put: false,
            delete: false,
        }
    }
}

/// The record operation a data API request maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    GetAll,
    GetOne,
    Create,
    Update,
    Delete,
}

impl Operation {
    pub fn flag_name(self) -> &'static str {
        match self {
            Operation::GetAll => "get",
            Operation::GetOne => "getOne",
            Operation::Create => "post",
            Operation::Update => "put",
            Operation::Delete => "delete",
        }
    }
}

impl EndpointMethods {
    pub fn allows(&self, op: Operation) -> bool {
        match op {
            Operation::GetAll => self.get,
            Operation::GetOne => self.get_one,
            Operation::Create => self.post,
            Operation::Update => self.put,
            Operation::Delete => self.delete,
        }
    }
}
