use serde::{Deserialize, Serialize};

/// Partition/sort attribute names of a key schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryKeyLayout {
    pub partition_attribute: String,
    pub sort_attribute: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecondaryIndexLayout {
    pub index_name: String,
    pub partition_attribute: String,
    pub sort_attribute: Option<String>,
}

/// Physical shape of the single table shared by a family of collections
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableLayout {
    pub table_name: String,
    pub primary_key: PrimaryKeyLayout,
    pub indexes: Vec<SecondaryIndexLayout>,
    pub ttl_attribute: Option<String>,
}

impl TableLayout {
    pub fn new(table_name: &str, partition_attribute: &str, sort_attribute: &str) -> Self {
        TableLayout {
            table_name: table_name.to_string(),
            primary_key: PrimaryKeyLayout {
                partition_attribute: partition_attribute.to_string(),
                sort_attribute: sort_attribute.to_string(),
            },
            indexes: Vec::new(),
            ttl_attribute: None,
        }
    }

    pub fn with_index(mut self, index_name: &str, partition_attribute: &str, sort_attribute: Option<&str>) -> Self {
        self.indexes.push(SecondaryIndexLayout {
            index_name: index_name.to_string(),
            partition_attribute: partition_attribute.to_string(),
            sort_attribute: sort_attribute.map(String::from),
        });
        self
    }

    pub fn with_ttl_attribute(mut self, attribute: &str) -> Self {
        self.ttl_attribute = Some(attribute.to_string());
        self
    }

    pub fn index(&self, index_name: &str) -> Option<&SecondaryIndexLayout> {
        self.indexes.iter().find(|i| i.index_name == index_name)
    }

    /// Layouts are interchangeable for parent/child purposes when they address
    /// the same table through the same primary key.
    pub fn shares_primary_key(&self, other: &TableLayout) -> bool {
        self.table_name == other.table_name && self.primary_key == other.primary_key
    }
}
