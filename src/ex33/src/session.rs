//! An open save: schema, document, and the views derived from them.
//!
//! The index and projection are always rebuilt wholesale from the current
//! document, never patched in place, so they cannot drift from it.

use tracing::info;

use crate::document::SaveDocument;
use crate::edit::{apply_batch, EditBatch, EditError};
use crate::index::{Index, IndexError};
use crate::mapping::Schema;
use crate::project::{CategoryNode, GapRecord, Projection};

#[derive(Debug, Clone)]
pub struct Session {
    schema: Schema,
    document: SaveDocument,
    index: Index,
    projection: Projection,
}

impl Session {
    pub fn new(schema: Schema, document: SaveDocument) -> Result<Self, IndexError> {
        let index = Index::build(&document)?;
        let projection = Projection::build(&document, &index, &schema);
        info!(
            leaves = index.len(),
            gaps = projection.gaps.len(),
            "Opened save session"
        );
        Ok(Session {
            schema,
            document,
            index,
            projection,
        })
    }

    /// Swap in a freshly loaded document.
    /// On failure the session keeps its previous document.
    pub fn replace_document(&mut self, document: SaveDocument) -> Result<(), IndexError> {
        let index = Index::build(&document)?;
        self.projection = Projection::build(&document, &index, &self.schema);
        self.index = index;
        self.document = document;
        Ok(())
    }

    /// Re-project the current document under a different schema
    pub fn reload_schema(&mut self, schema: Schema) {
        self.projection = Projection::build(&self.document, &self.index, &schema);
        self.schema = schema;
    }

    /// Apply a batch of edits atomically. On error nothing changes.
    pub fn apply(&mut self, batch: &EditBatch) -> Result<(), EditError> {
        if batch.is_empty() {
            return Ok(());
        }
        let edited = apply_batch(&self.document, &self.index, &self.schema, batch)?;
        self.replace_document(edited)?;
        Ok(())
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn document(&self) -> &SaveDocument {
        &self.document
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn tree(&self) -> &CategoryNode {
        &self.projection.root
    }

    pub fn gaps(&self) -> &[GapRecord] {
        &self.projection.gaps
    }

    /// Filtered copy of the category tree; empty query returns everything
    pub fn search(&self, query: &str) -> CategoryNode {
        self.projection.search(query)
    }

    pub fn into_document(self) -> SaveDocument {
        self.document
    }
}
