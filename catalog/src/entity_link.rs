//! Entity links and fully qualified names.
//!
//! An entity link points a test case at a table, optionally narrowed to a
//! column: `<#E::table::service.database.schema.table::columns::column>`.
//! Segments are separated by `::`; the third segment is always the table FQN.

use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use thiserror::Error;

pub const SEPARATOR: &str = "::";

const FQN_SEPARATOR: char = '.';
const FQN_QUOTE: char = '"';

static ENTITY_LINK_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^<#E::(?P<kind>[A-Za-z]+)::(?P<fqn>[^:<>]+)(?:::(?P<field>[A-Za-z]+)::(?P<column>[^:<>]+))?>$")
        .expect("entity link pattern is valid")
});

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EntityLinkError {
    #[error("Malformed entity link: {0}")]
    Malformed(String),

    #[error("Unsupported entity link field '{field}' in {link}")]
    UnsupportedField { link: String, field: String },
}

/// Parsed form of an entity link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityLink {
    entity_type: String,
    table_fqn: String,
    column: Option<String>,
}

impl EntityLink {
    pub fn table(table_fqn: impl Into<String>) -> Self {
        Self {
            entity_type: "table".to_string(),
            table_fqn: table_fqn.into(),
            column: None,
        }
    }

    pub fn column(table_fqn: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            entity_type: "table".to_string(),
            table_fqn: table_fqn.into(),
            column: Some(column.into()),
        }
    }

    pub fn parse(link: &str) -> Result<Self, EntityLinkError> {
        let captures = ENTITY_LINK_PATTERN
            .captures(link.trim())
            .ok_or_else(|| EntityLinkError::Malformed(link.to_string()))?;

        if let Some(field) = captures.name("field") {
            if field.as_str() != "columns" {
                return Err(EntityLinkError::UnsupportedField {
                    link: link.to_string(),
                    field: field.as_str().to_string(),
                });
            }
        }

        Ok(Self {
            entity_type: captures["kind"].to_string(),
            table_fqn: captures["fqn"].to_string(),
            column: captures.name("column").map(|c| c.as_str().to_string()),
        })
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn table_fqn(&self) -> &str {
        &self.table_fqn
    }

    pub fn column_name(&self) -> Option<&str> {
        self.column.as_deref()
    }
}

impl FromStr for EntityLink {
    type Err = EntityLinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for EntityLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<#E::{}::{}", self.entity_type, self.table_fqn)?;
        if let Some(column) = &self.column {
            write!(f, "::columns::{}", column)?;
        }
        write!(f, ">")
    }
}

/// Table FQN of an entity link: the third `::` segment with any `>` removed.
///
/// Lenient on purpose: works on any link shaped like
/// `<type>::<x>::<table.fqn>[::...]`, not only on links [`EntityLink::parse`]
/// accepts.
pub fn table_fqn(link: &str) -> Option<String> {
    link.split(SEPARATOR)
        .nth(2)
        .map(|segment| segment.replace('>', ""))
        .filter(|segment| !segment.is_empty())
}

/// Column name of an entity link, when it targets a column.
pub fn column_name(link: &str) -> Option<String> {
    let mut segments = link.split(SEPARATOR).skip(3);
    match (segments.next(), segments.next()) {
        (Some("columns"), Some(column)) => Some(column.replace('>', "")),
        _ => None,
    }
}

/// Split a fully qualified name on `.`, keeping quoted parts intact.
pub fn split_fqn(fqn: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quoted = false;

    for c in fqn.chars() {
        match c {
            FQN_QUOTE => quoted = !quoted,
            FQN_SEPARATOR if !quoted => parts.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    parts.push(current);
    parts
}

/// Join name parts into a fully qualified name, quoting parts that contain `.`.
pub fn build_fqn<S: AsRef<str>>(parts: &[S]) -> String {
    parts
        .iter()
        .map(|part| {
            let part = part.as_ref();
            if part.contains(FQN_SEPARATOR) {
                format!("{}{}{}", FQN_QUOTE, part, FQN_QUOTE)
            } else {
                part.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(".")
}

/// Service name of a table FQN: its leading segment.
pub fn service_name(table_fqn: &str) -> Option<String> {
    split_fqn(table_fqn)
        .into_iter()
        .next()
        .filter(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_fqn_extraction() {
        assert_eq!(
            table_fqn("type::suite::table.fqn::column").as_deref(),
            Some("table.fqn")
        );
        assert_eq!(
            table_fqn("<#E::table::svc.db.sch.orders>").as_deref(),
            Some("svc.db.sch.orders")
        );
        assert_eq!(
            table_fqn("<#E::table::svc.db.sch.orders::columns::id>").as_deref(),
            Some("svc.db.sch.orders")
        );
        assert_eq!(table_fqn("<#E::table>"), None);
        assert_eq!(table_fqn("<#E::table::>"), None);
    }

    #[test]
    fn test_column_name_extraction() {
        assert_eq!(
            column_name("<#E::table::svc.db.sch.orders::columns::id>").as_deref(),
            Some("id")
        );
        assert_eq!(column_name("<#E::table::svc.db.sch.orders>"), None);
    }

    #[test]
    fn test_parse_table_link() {
        let link = EntityLink::parse("<#E::table::svc.db.sch.orders>").unwrap();
        assert_eq!(link.entity_type(), "table");
        assert_eq!(link.table_fqn(), "svc.db.sch.orders");
        assert_eq!(link.column_name(), None);
        assert_eq!(link.to_string(), "<#E::table::svc.db.sch.orders>");
    }

    #[test]
    fn test_parse_column_link() {
        let link: EntityLink = "<#E::table::svc.db.sch.orders::columns::amount>"
            .parse()
            .unwrap();
        assert_eq!(link.table_fqn(), "svc.db.sch.orders");
        assert_eq!(link.column_name(), Some("amount"));
        assert_eq!(link, EntityLink::column("svc.db.sch.orders", "amount"));
        assert_eq!(
            link.to_string(),
            "<#E::table::svc.db.sch.orders::columns::amount>"
        );
    }

    #[test]
    fn test_parse_rejects_malformed_links() {
        assert!(matches!(
            EntityLink::parse("svc.db.sch.orders"),
            Err(EntityLinkError::Malformed(_))
        ));
        assert!(matches!(
            EntityLink::parse("<#E::table::>"),
            Err(EntityLinkError::Malformed(_))
        ));
        assert!(matches!(
            EntityLink::parse("<#E::table::svc.db.sch.orders::tags::pii>"),
            Err(EntityLinkError::UnsupportedField { .. })
        ));
    }

    #[test]
    fn test_split_fqn_respects_quotes() {
        assert_eq!(split_fqn("svc.db.sch.orders"), vec!["svc", "db", "sch", "orders"]);
        assert_eq!(
            split_fqn("\"my.svc\".db.sch.orders"),
            vec!["my.svc", "db", "sch", "orders"]
        );
        assert_eq!(build_fqn(&["my.svc", "db", "orders"]), "\"my.svc\".db.orders");
    }

    #[test]
    fn test_service_name() {
        assert_eq!(service_name("svc.db.sch.orders").as_deref(), Some("svc"));
        assert_eq!(
            service_name("\"my.svc\".db.sch.orders").as_deref(),
            Some("my.svc")
        );
        assert_eq!(service_name(""), None);
    }
}
