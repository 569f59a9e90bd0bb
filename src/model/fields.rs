//! Typed field descriptors for declared models.
//!
//! A [`FieldDescriptor`] is pure data: the declared shape of one column plus
//! the foreign-key metadata the applier needs. Actions are not part of a
//! declaration; the differ attaches them to its own output.

use serde::{Deserialize, Serialize};

/// Column kind. The serialized names double as the schema-log `ftype` codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    #[serde(rename = "INT")]
    Int,
    #[serde(rename = "VARCHAR")]
    Char,
    #[serde(rename = "FK")]
    ForeignKey,
    #[serde(rename = "AUTOI")]
    AutoIncrement,
}

impl FieldKind {
    pub fn log_code(self) -> &'static str {
        match self {
            FieldKind::Int => "INT",
            FieldKind::Char => "VARCHAR",
            FieldKind::ForeignKey => "FK",
            FieldKind::AutoIncrement => "AUTOI",
        }
    }

    pub fn from_log_code(code: &str) -> Option<Self> {
        match code {
            "INT" => Some(FieldKind::Int),
            "VARCHAR" => Some(FieldKind::Char),
            "FK" => Some(FieldKind::ForeignKey),
            "AUTOI" => Some(FieldKind::AutoIncrement),
            _ => None,
        }
    }
}

/// Referential action for foreign-key delete/update rules.
///
/// The log keeps the compact codes (`SETNULL`, `NOACTION`); [`Self::sql`]
/// produces the spelling MySQL accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferentialAction {
    #[serde(rename = "CASCADE")]
    Cascade,
    #[serde(rename = "RESTRICT")]
    Restrict,
    #[serde(rename = "SETNULL")]
    SetNull,
    #[serde(rename = "NOACTION")]
    NoAction,
}

impl ReferentialAction {
    pub fn log_code(self) -> &'static str {
        match self {
            ReferentialAction::Cascade => "CASCADE",
            ReferentialAction::Restrict => "RESTRICT",
            ReferentialAction::SetNull => "SETNULL",
            ReferentialAction::NoAction => "NOACTION",
        }
    }

    pub fn from_log_code(code: &str) -> Option<Self> {
        match code {
            "CASCADE" => Some(ReferentialAction::Cascade),
            "RESTRICT" => Some(ReferentialAction::Restrict),
            "SETNULL" => Some(ReferentialAction::SetNull),
            "NOACTION" => Some(ReferentialAction::NoAction),
            _ => None,
        }
    }

    pub fn sql(self) -> &'static str {
        match self {
            ReferentialAction::Cascade => "CASCADE",
            ReferentialAction::Restrict => "RESTRICT",
            ReferentialAction::SetNull => "SET NULL",
            ReferentialAction::NoAction => "NO ACTION",
        }
    }
}

/// What the next apply pass must do with a table or field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldAction {
    #[serde(rename = "CREATE")]
    Create,
    #[serde(rename = "UPDATE")]
    Update,
    #[serde(rename = "DELETE")]
    Delete,
    #[serde(rename = "NOACTION")]
    NoAction,
}

impl FieldAction {
    pub fn log_code(self) -> &'static str {
        match self {
            FieldAction::Create => "CREATE",
            FieldAction::Update => "UPDATE",
            FieldAction::Delete => "DELETE",
            FieldAction::NoAction => "NOACTION",
        }
    }

    pub fn from_log_code(code: &str) -> Option<Self> {
        match code {
            "CREATE" => Some(FieldAction::Create),
            "UPDATE" => Some(FieldAction::Update),
            "DELETE" => Some(FieldAction::Delete),
            "NOACTION" => Some(FieldAction::NoAction),
            _ => None,
        }
    }
}

/// Declared shape of a single column.
///
/// Field names follow the schema-log wire format in serialized form so that
/// migration artifacts and log rows speak the same vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    #[serde(rename = "fname")]
    pub name: String,
    #[serde(rename = "ftype")]
    pub kind: FieldKind,
    #[serde(rename = "flength")]
    pub length: u32,
    #[serde(rename = "fnull")]
    pub nullable: bool,
    #[serde(rename = "fk")]
    pub fk_target: Option<String>,
    pub on_delete: Option<ReferentialAction>,
    pub on_update: Option<ReferentialAction>,
    #[serde(rename = "rel_name")]
    pub relation_name: Option<String>,
}

impl FieldDescriptor {
    fn base(name: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            length: 0,
            nullable: false,
            fk_target: None,
            on_delete: None,
            on_update: None,
            relation_name: None,
        }
    }

    pub fn int(name: &str) -> Self {
        Self::base(name, FieldKind::Int)
    }

    pub fn char(name: &str, length: u32) -> Self {
        let mut f = Self::base(name, FieldKind::Char);
        f.length = length;
        f
    }

    pub fn auto_increment(name: &str) -> Self {
        Self::base(name, FieldKind::AutoIncrement)
    }

    /// Foreign key into `target`'s `id` column. Both referential rules
    /// default to `RESTRICT`.
    pub fn foreign_key(name: &str, target: &str) -> Self {
        let mut f = Self::base(name, FieldKind::ForeignKey);
        f.fk_target = Some(target.to_lowercase());
        f.on_delete = Some(ReferentialAction::Restrict);
        f.on_update = Some(ReferentialAction::Restrict);
        f
    }

    pub fn length(mut self, length: u32) -> Self {
        self.length = length;
        self
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn on_delete(mut self, action: ReferentialAction) -> Self {
        self.on_delete = Some(action);
        self
    }

    pub fn on_update(mut self, action: ReferentialAction) -> Self {
        self.on_update = Some(action);
        self
    }

    pub fn relation(mut self, name: &str) -> Self {
        self.relation_name = Some(name.to_string());
        self
    }

    /// Attribute-level equality, name excluded: the differ compares a
    /// declared field against its logged counterpart with this.
    pub fn same_shape(&self, other: &FieldDescriptor) -> bool {
        self.kind == other.kind
            && self.length == other.length
            && self.nullable == other.nullable
            && self.fk_target == other.fk_target
            && self.on_delete == other.on_delete
            && self.on_update == other.on_update
    }
}
