//! Wiki page schema
//!
//! # 8-field schema
//!
//! 1. `doc_id` - Stable document id (STORED, raw keyword)
//! 2. `wiki` - Wiki name (STORED, raw keyword)
//! 3. `title` - Page title (STORED, indexed)
//! 4. `content` - Page body (NOT STORED, indexed)
//! 5. `language` - Language code (STORED, raw keyword)
//! 6. `author` - Last author (STORED, raw keyword)
//! 7. `modified` - Page modification date (STORED)
//! 8. `indexed_at` - Indexing timestamp (STORED)

use tantivy::schema::{Field, Schema, STORED, STRING, TEXT};

// Field name constants (for type-safe access)
pub const FIELD_DOC_ID: &str = "doc_id";
pub const FIELD_WIKI: &str = "wiki";
pub const FIELD_TITLE: &str = "title";
pub const FIELD_CONTENT: &str = "content";
pub const FIELD_LANGUAGE: &str = "language";
pub const FIELD_AUTHOR: &str = "author";
pub const FIELD_MODIFIED: &str = "modified";
pub const FIELD_INDEXED_AT: &str = "indexed_at";

/// Kind of value a writable schema field accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Keyword,
    Date,
}

/// Build the wiki page schema.
pub fn build_schema() -> Schema {
    let mut schema_builder = Schema::builder();

    // doc_id - raw keyword, stored so hits can name the page
    schema_builder.add_text_field(FIELD_DOC_ID, STRING | STORED);

    // wiki / language / author - exact-match metadata
    schema_builder.add_text_field(FIELD_WIKI, STRING | STORED);

    // title - searchable and stored for result display
    schema_builder.add_text_field(FIELD_TITLE, TEXT | STORED);

    // content - searchable only (NOT STORED to save space)
    schema_builder.add_text_field(FIELD_CONTENT, TEXT);

    schema_builder.add_text_field(FIELD_LANGUAGE, STRING | STORED);
    schema_builder.add_text_field(FIELD_AUTHOR, STRING | STORED);

    // dates - stored metadata
    schema_builder.add_date_field(FIELD_MODIFIED, STORED);
    schema_builder.add_date_field(FIELD_INDEXED_AT, STORED);

    schema_builder.build()
}

/// Field handles (cached for performance).
#[derive(Debug, Clone)]
pub struct SchemaFields {
    pub schema: Schema,
    pub doc_id: Field,
    pub wiki: Field,
    pub title: Field,
    pub content: Field,
    pub language: Field,
    pub author: Field,
    pub modified: Field,
    pub indexed_at: Field,
}

impl SchemaFields {
    pub fn new() -> Self {
        Self::for_schema(build_schema()).expect("built-in schema has all fields")
    }

    /// Bind field handles against an existing schema, e.g. one read back
    /// from an on-disk index. Fails with the missing field name when the
    /// stored schema does not match this build.
    pub fn for_schema(schema: Schema) -> std::result::Result<Self, String> {
        let field = |name: &str| {
            schema
                .get_field(name)
                .map_err(|_| format!("schema is missing the '{name}' field"))
        };

        Ok(Self {
            doc_id: field(FIELD_DOC_ID)?,
            wiki: field(FIELD_WIKI)?,
            title: field(FIELD_TITLE)?,
            content: field(FIELD_CONTENT)?,
            language: field(FIELD_LANGUAGE)?,
            author: field(FIELD_AUTHOR)?,
            modified: field(FIELD_MODIFIED)?,
            indexed_at: field(FIELD_INDEXED_AT)?,
            schema,
        })
    }

    /// Resolve a producer-supplied field name to a writable field.
    ///
    /// `doc_id` and `indexed_at` are managed by the store itself and are not
    /// writable through entry field mappings.
    pub fn writable_field(&self, name: &str) -> Option<(Field, FieldKind)> {
        match name {
            FIELD_TITLE => Some((self.title, FieldKind::Text)),
            FIELD_CONTENT => Some((self.content, FieldKind::Text)),
            FIELD_WIKI => Some((self.wiki, FieldKind::Keyword)),
            FIELD_LANGUAGE => Some((self.language, FieldKind::Keyword)),
            FIELD_AUTHOR => Some((self.author, FieldKind::Keyword)),
            FIELD_MODIFIED => Some((self.modified, FieldKind::Date)),
            _ => None,
        }
    }

    /// Fields the query parser searches by default.
    pub fn default_search_fields(&self) -> Vec<Field> {
        vec![self.title, self.content]
    }
}

impl Default for SchemaFields {
    fn default() -> Self {
        Self::new()
    }
}
