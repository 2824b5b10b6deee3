//! Tantivy keyword index with tenant-scoped BM25 search
//!
//! Every document carries a raw-indexed `user` field; queries are wrapped
//! in a boolean filter on that field so lexical search can never cross a
//! tenant boundary at the index level.

use std::path::PathBuf;
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, Occur, Query, QueryParser, TermQuery};
use tantivy::schema::{
    Field, IndexRecordOption, Schema, Value, INDEXED, STORED, STRING, TEXT,
};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyError, Term};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KeywordIndexError {
    #[error("Index initialization failed: {0}")]
    InitializationError(String),

    #[error("Insert failed: {0}")]
    InsertError(String),

    #[error("Search failed: {0}")]
    SearchError(String),

    #[error("Query parsing error: {0}")]
    QueryParseError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Tantivy error: {0}")]
    TantivyError(#[from] TantivyError),
}

/// One BM25 hit
#[derive(Debug, Clone)]
pub struct KeywordHit {
    /// Internal numeric ID assigned at insert time
    pub id: u64,
    /// BM25 relevance score
    pub score: f32,
}

/// Tantivy full-text index wrapper
pub struct KeywordIndex {
    index: Index,
    reader: IndexReader,
    writer: IndexWriter,
    id_field: Field,
    user_field: Field,
    text_field: Field,
}

const WRITER_BUFFER_BYTES: usize = 50_000_000;

impl KeywordIndex {
    /// Create an in-memory index; state does not survive the process
    pub fn in_memory() -> Result<Self, KeywordIndexError> {
        let (schema, id_field, user_field, text_field) = Self::schema();
        let index = Index::create_in_ram(schema);
        Self::finish(index, id_field, user_field, text_field)
    }

    /// Create or open an on-disk index in `dir`
    pub fn on_disk(dir: PathBuf) -> Result<Self, KeywordIndexError> {
        if dir.join("meta.json").exists() {
            let index = Index::open_in_dir(&dir)
                .map_err(|e| KeywordIndexError::InitializationError(e.to_string()))?;
            let schema = index.schema();
            let id_field = schema.get_field("id").map_err(|_| {
                KeywordIndexError::InitializationError("missing 'id' field".to_string())
            })?;
            let user_field = schema.get_field("user").map_err(|_| {
                KeywordIndexError::InitializationError("missing 'user' field".to_string())
            })?;
            let text_field = schema.get_field("text").map_err(|_| {
                KeywordIndexError::InitializationError("missing 'text' field".to_string())
            })?;
            return Self::finish(index, id_field, user_field, text_field);
        }

        std::fs::create_dir_all(&dir)?;
        let (schema, id_field, user_field, text_field) = Self::schema();
        let index = Index::create_in_dir(&dir, schema)
            .map_err(|e| KeywordIndexError::InitializationError(e.to_string()))?;
        Self::finish(index, id_field, user_field, text_field)
    }

    fn schema() -> (Schema, Field, Field, Field) {
        let mut builder = Schema::builder();
        let id_field = builder.add_u64_field("id", INDEXED | STORED);
        let user_field = builder.add_text_field("user", STRING | STORED);
        let text_field = builder.add_text_field("text", TEXT | STORED);
        (builder.build(), id_field, user_field, text_field)
    }

    fn finish(
        index: Index,
        id_field: Field,
        user_field: Field,
        text_field: Field,
    ) -> Result<Self, KeywordIndexError> {
        let writer = index
            .writer(WRITER_BUFFER_BYTES)
            .map_err(|e| KeywordIndexError::InitializationError(e.to_string()))?;
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()
            .map_err(|e: TantivyError| KeywordIndexError::InitializationError(e.to_string()))?;

        Ok(Self {
            index,
            reader,
            writer,
            id_field,
            user_field,
            text_field,
        })
    }

    /// Insert a document owned by `user`
    pub fn insert(&mut self, id: u64, user: &str, text: &str) -> Result<(), KeywordIndexError> {
        let document = doc!(
            self.id_field => id,
            self.user_field => user,
            self.text_field => text,
        );
        self.writer
            .add_document(document)
            .map_err(|e| KeywordIndexError::InsertError(e.to_string()))?;
        Ok(())
    }

    /// Commit pending writes and refresh the reader
    pub fn commit(&mut self) -> Result<(), KeywordIndexError> {
        self.writer
            .commit()
            .map_err(|e| KeywordIndexError::InsertError(e.to_string()))?;
        self.reader
            .reload()
            .map_err(|e| KeywordIndexError::SearchError(e.to_string()))?;
        Ok(())
    }

    /// BM25 search restricted to one tenant's documents
    pub fn search(
        &self,
        query: &str,
        user: &str,
        limit: usize,
    ) -> Result<Vec<KeywordHit>, KeywordIndexError> {
        let searcher = self.reader.searcher();

        let parser = QueryParser::for_index(&self.index, vec![self.text_field]);
        let text_query = parser
            .parse_query(query)
            .map_err(|e| KeywordIndexError::QueryParseError(e.to_string()))?;

        let user_query: Box<dyn Query> = Box::new(TermQuery::new(
            Term::from_field_text(self.user_field, user),
            IndexRecordOption::Basic,
        ));
        let scoped = BooleanQuery::new(vec![
            (Occur::Must, user_query),
            (Occur::Must, text_query),
        ]);

        let top_docs = searcher
            .search(&scoped, &TopDocs::with_limit(limit.max(1)))
            .map_err(|e| KeywordIndexError::SearchError(e.to_string()))?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, address) in top_docs {
            let retrieved: tantivy::TantivyDocument = searcher
                .doc(address)
                .map_err(|e| KeywordIndexError::SearchError(e.to_string()))?;
            let id = retrieved
                .get_first(self.id_field)
                .and_then(|v| v.as_u64())
                .ok_or_else(|| {
                    KeywordIndexError::SearchError("missing or invalid id field".to_string())
                })?;
            hits.push(KeywordHit { id, score });
        }
        Ok(hits)
    }

    /// Delete a document by its numeric ID; takes effect at the next commit
    pub fn delete(&mut self, id: u64) {
        self.writer
            .delete_term(Term::from_field_u64(self.id_field, id));
    }

    pub fn len(&self) -> u64 {
        self.reader.searcher().num_docs()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_search() {
        let mut index = KeywordIndex::in_memory().unwrap();
        index
            .insert(1, "u1", "the quick brown fox jumps over the lazy dog")
            .unwrap();
        index
            .insert(2, "u1", "a fast red fox leaps above a sleepy canine")
            .unwrap();
        index.insert(3, "u1", "rust systems programming").unwrap();
        index.commit().unwrap();

        let hits = index.search("fox", "u1", 10).unwrap();
        assert_eq!(hits.len(), 2);

        let hits = index.search("rust", "u1", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, 3);
    }

    #[test]
    fn test_user_scoping() {
        let mut index = KeywordIndex::in_memory().unwrap();
        index.insert(1, "u1", "shared vocabulary document").unwrap();
        index.insert(2, "u2", "shared vocabulary document").unwrap();
        index.commit().unwrap();

        let hits = index.search("vocabulary", "u1", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, 1);

        let hits = index.search("vocabulary", "nobody", 10).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_delete() {
        let mut index = KeywordIndex::in_memory().unwrap();
        index.insert(1, "u1", "first document").unwrap();
        index.insert(2, "u1", "second document").unwrap();
        index.commit().unwrap();
        assert_eq!(index.len(), 2);

        index.delete(1);
        index.commit().unwrap();
        assert_eq!(index.len(), 1);

        let hits = index.search("document", "u1", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, 2);
    }

    #[test]
    fn test_on_disk_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keyword");
        {
            let mut index = KeywordIndex::on_disk(path.clone()).unwrap();
            index.insert(7, "u1", "persistent document").unwrap();
            index.commit().unwrap();
        }
        {
            let index = KeywordIndex::on_disk(path).unwrap();
            assert_eq!(index.len(), 1);
            let hits = index.search("persistent", "u1", 10).unwrap();
            assert_eq!(hits.len(), 1);
            assert_eq!(hits[0].id, 7);
        }
    }

    #[test]
    fn test_phrase_query() {
        let mut index = KeywordIndex::in_memory().unwrap();
        index.insert(1, "u1", "this is a test document").unwrap();
        index.insert(2, "u1", "another test with different words").unwrap();
        index.commit().unwrap();

        let hits = index.search("\"test document\"", "u1", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, 1);
    }
}
