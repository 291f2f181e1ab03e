use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Marker written into `p1` when a school day was a holiday
pub const HOLIDAY_FLAG: &str = "__IS_HOLIDAY__";

/// The only username the login endpoint accepts
pub const ADMIN_USERNAME: &str = "admin";

/// How the natural key of a table is validated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    /// Calendar date in YYYY-MM-DD format
    Date,
    /// One of the fixed special entry types
    SpecialType,
}

/// A free-text column together with its display label
#[derive(Debug, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub label: &'static str,
}

/// A flat table keyed by a natural key with a fixed list of text columns
#[derive(Debug, PartialEq, Eq)]
pub struct Table {
    pub name: &'static str,
    pub key: &'static str,
    pub key_kind: KeyKind,
    pub fields: &'static [Field],
    /// What the table holds, used in log lines and error messages
    pub noun: &'static str,
}

impl Table {
    pub fn field(&self, name: &str) -> Option<&'static Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

pub static SCHOOL: Table = Table {
    name: "school_entries",
    key: "date",
    key_kind: KeyKind::Date,
    fields: &[
        Field { name: "p1", label: "P1 - First Period" },
        Field { name: "p2", label: "P2 - Second Period" },
        Field { name: "p3", label: "P3 - Third Period" },
        Field { name: "p4", label: "P4 - Fourth Period" },
        Field { name: "p5", label: "P5 - Fifth Period" },
        Field { name: "p6", label: "P6 - Sixth Period" },
        Field { name: "p7", label: "P7 - Seventh Period" },
        Field { name: "p8", label: "P8 - Eighth Period" },
    ],
    noun: "school entry",
};

pub static WHATIDID: Table = Table {
    name: "whatidid_entries",
    key: "date",
    key_kind: KeyKind::Date,
    fields: &[
        Field { name: "ioqm", label: "IOQM" },
        Field { name: "nsep", label: "NSEP" },
        Field { name: "schol", label: "Schol" },
    ],
    noun: "whatidid entry",
};

pub static SPECIAL: Table = Table {
    name: "special_entries",
    key: "type",
    key_kind: KeyKind::SpecialType,
    fields: &[Field { name: "content", label: "Content" }],
    noun: "special entry",
};

/// The two dated journals shown on the calendar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    School,
    Whatidid,
}

impl Section {
    pub const ALL: [Section; 2] = [Section::School, Section::Whatidid];

    pub fn as_str(self) -> &'static str {
        match self {
            Section::School => "school",
            Section::Whatidid => "whatidid",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Section::School => "School",
            Section::Whatidid => "What I Did",
        }
    }

    pub fn table(self) -> &'static Table {
        match self {
            Section::School => &SCHOOL,
            Section::Whatidid => &WHATIDID,
        }
    }

    /// The note linked from this section's header
    pub fn special(self) -> SpecialKind {
        match self {
            Section::School => SpecialKind::HolidayHomework,
            Section::Whatidid => SpecialKind::WhatHadDone,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|section| section.as_str() == s)
    }
}

/// Singleton text blobs keyed by type rather than by date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialKind {
    HolidayHomework,
    WhatHadDone,
}

impl SpecialKind {
    pub const ALL: [SpecialKind; 2] = [SpecialKind::HolidayHomework, SpecialKind::WhatHadDone];

    pub fn as_str(self) -> &'static str {
        match self {
            SpecialKind::HolidayHomework => "holiday_homework",
            SpecialKind::WhatHadDone => "what_had_done",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            SpecialKind::HolidayHomework => "Holiday Homework",
            SpecialKind::WhatHadDone => "What I Had Done",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == s)
    }
}

/// One row of a journal table.
///
/// `values` is parallel to `table.fields`. An entry that has not been stored
/// yet has no `id` and serializes without one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub table: &'static Table,
    pub id: Option<i64>,
    pub key: String,
    pub values: Vec<String>,
}

impl Entry {
    /// The default shown for a key that has never been written
    pub fn empty(table: &'static Table, key: impl Into<String>) -> Self {
        Self {
            table,
            id: None,
            key: key.into(),
            values: vec![String::new(); table.fields.len()],
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.table
            .fields
            .iter()
            .position(|f| f.name == field)
            .map(|idx| self.values[idx].as_str())
    }

    pub fn fields(&self) -> impl Iterator<Item = (&'static Field, &str)> + '_ {
        self.table
            .fields
            .iter()
            .zip(self.values.iter().map(String::as_str))
    }

    /// True when a school day has been marked as a holiday
    pub fn is_holiday(&self) -> bool {
        self.get("p1")
            .map(|p1| p1.trim() == HOLIDAY_FLAG)
            .unwrap_or(false)
    }
}

impl Serialize for Entry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = self.values.len() + 1 + usize::from(self.id.is_some());
        let mut map = serializer.serialize_map(Some(len))?;
        if let Some(id) = self.id {
            map.serialize_entry("id", &id)?;
        }
        map.serialize_entry(self.table.key, &self.key)?;
        for (field, value) in self.fields() {
            map.serialize_entry(field.name, value)?;
        }
        map.end()
    }
}

/// A validated write: the key plus only the fields the client sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInput {
    pub table: &'static Table,
    pub key: String,
    pub values: Vec<(&'static str, String)>,
}

/// A stored user. Passwords are kept as entered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password: String,
}

/// Login body. Fields are kept as raw JSON so that a credential of the wrong
/// type is refused like any other wrong credential.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: Option<Value>,
    #[serde(default)]
    pub password: Option<Value>,
}

impl LoginRequest {
    /// Username and password, when both are strings
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(Value::String(username)), Some(Value::String(password))) => {
                Some((username.as_str(), password.as_str()))
            }
            _ => None,
        }
    }
}

/// The user as exposed to clients (no password)
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PublicUser {
    pub id: i64,
    pub username: String,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub user: PublicUser,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_school_entry_serializes_without_id() {
        let entry = Entry::empty(&SCHOOL, "2024-06-24");
        let value = serde_json::to_value(&entry).unwrap();

        assert_eq!(
            value,
            json!({
                "date": "2024-06-24",
                "p1": "", "p2": "", "p3": "", "p4": "",
                "p5": "", "p6": "", "p7": "", "p8": ""
            })
        );
    }

    #[test]
    fn test_stored_entry_serializes_id_first() {
        let mut entry = Entry::empty(&WHATIDID, "2024-07-01");
        entry.id = Some(7);
        entry.values[0] = "Combinatorics".to_string();

        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.starts_with("{\"id\":7,\"date\":\"2024-07-01\""));
        assert!(json.contains("\"ioqm\":\"Combinatorics\""));
        assert!(json.contains("\"schol\":\"\""));
    }

    #[test]
    fn test_special_entry_uses_type_key() {
        let entry = Entry::empty(&SPECIAL, "holiday_homework");
        let value = serde_json::to_value(&entry).unwrap();

        assert_eq!(value, json!({"type": "holiday_homework", "content": ""}));
    }

    #[test]
    fn test_entry_get() {
        let mut entry = Entry::empty(&SCHOOL, "2024-06-24");
        entry.values[2] = "Physics lab".to_string();

        assert_eq!(entry.get("p3"), Some("Physics lab"));
        assert_eq!(entry.get("p1"), Some(""));
        assert_eq!(entry.get("p9"), None);
    }

    #[test]
    fn test_is_holiday() {
        let mut entry = Entry::empty(&SCHOOL, "2024-06-24");
        assert!(!entry.is_holiday());

        entry.values[0] = format!("  {}\n", HOLIDAY_FLAG);
        assert!(entry.is_holiday());

        let whatidid = Entry::empty(&WHATIDID, "2024-06-24");
        assert!(!whatidid.is_holiday());
    }

    #[test]
    fn test_section_parse() {
        assert_eq!(Section::parse("school"), Some(Section::School));
        assert_eq!(Section::parse("whatidid"), Some(Section::Whatidid));
        assert_eq!(Section::parse("School"), None);
        assert_eq!(Section::School.table().name, "school_entries");
    }

    #[test]
    fn test_section_special() {
        assert_eq!(Section::School.special(), SpecialKind::HolidayHomework);
        assert_eq!(Section::Whatidid.special(), SpecialKind::WhatHadDone);
    }

    #[test]
    fn test_special_kind_parse() {
        for kind in SpecialKind::ALL {
            assert_eq!(SpecialKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(SpecialKind::parse("homework"), None);
    }

    #[test]
    fn test_table_field_lookup() {
        assert_eq!(SCHOOL.fields.len(), 8);
        assert_eq!(SCHOOL.field("p8").map(|f| f.label), Some("P8 - Eighth Period"));
        assert!(WHATIDID.field("p1").is_none());
    }

    #[test]
    fn test_public_user_drops_password() {
        let user = User {
            id: 1,
            username: "admin".to_string(),
            password: "secret".to_string(),
        };
        let value = serde_json::to_value(PublicUser::from(user)).unwrap();

        assert_eq!(value, json!({"id": 1, "username": "admin"}));
    }

    #[test]
    fn test_login_request_missing_fields() {
        let request: LoginRequest = serde_json::from_str("{}").unwrap();
        assert!(request.username.is_none());
        assert!(request.password.is_none());
        assert_eq!(request.credentials(), None);
    }

    #[test]
    fn test_login_request_non_string_fields() {
        let request: LoginRequest =
            serde_json::from_str(r#"{"username": 1, "password": "x"}"#).unwrap();
        assert_eq!(request.credentials(), None);

        let request: LoginRequest =
            serde_json::from_str(r#"{"username": "admin", "password": ["x"]}"#).unwrap();
        assert_eq!(request.credentials(), None);

        let request: LoginRequest =
            serde_json::from_str(r#"{"username": "admin", "password": "x"}"#).unwrap();
        assert_eq!(request.credentials(), Some(("admin", "x")));
    }
}
