//! Record Format Integration Tests
//!
//! Export written to disk must read back through the record readers and
//! check cleanly against its documents.

use tagcompare::adapters::{DocumentEntry, DocumentReader, DocumentSource, Exporter, SpanReader, SpanSource};
use tagcompare::core::{check_spans, deduplicate_spans};
use tagcompare::domain::{Document, OffsetUnit, Span};
use tempfile::TempDir;
use tokio::fs::File;
use tokio::io::{BufReader, BufWriter};

#[tokio::test]
async fn test_export_reads_back_and_checks_clean() {
    let temp = TempDir::new().unwrap();
    let docs_path = temp.path().join("docs.tsv");
    let tags_path = temp.path().join("tags.tsv");

    let mut doc = Document::new("42", "naïve\tcats\\dogs");
    doc.authors = b"Doe J".to_vec();
    doc.year = b"1999".to_vec();
    let spans = vec![
        Span::new("42", 7, 10, "cats", "Animal", "a")
            .with_serial("s1")
            .with_serial("s2"),
        Span::new("42", 12, 15, "dogs", "Animal", "a").with_serial("s3"),
    ];

    let mut exporter = Exporter::new(
        BufWriter::new(File::create(&docs_path).await.unwrap()),
        BufWriter::new(File::create(&tags_path).await.unwrap()),
    );
    exporter.write_document(&doc, &spans).await.unwrap();
    exporter.flush().await.unwrap();
    drop(exporter);

    let mut documents = DocumentReader::new(
        BufReader::new(File::open(&docs_path).await.unwrap()),
        "docs.tsv",
    );
    match documents.next_document().await.unwrap() {
        Some(DocumentEntry::Document(read)) => assert_eq!(read, doc),
        other => panic!("unexpected entry: {:?}", other),
    }

    let mut reader = SpanReader::new(
        BufReader::new(File::open(&tags_path).await.unwrap()),
        "tags.tsv",
        "a",
    );
    let read = reader.document_spans("42").await.unwrap();
    assert_eq!(read.len(), 3);
    // one line per serial; deduplication restores the exported spans
    assert_eq!(deduplicate_spans(read), spans);

    // byte offsets: "naïve" is six bytes, so the export checks clean as bytes
    let mut documents = DocumentReader::new(
        BufReader::new(File::open(&docs_path).await.unwrap()),
        "docs.tsv",
    );
    let mut reader = SpanReader::new(
        BufReader::new(File::open(&tags_path).await.unwrap()),
        "tags.tsv",
        "a",
    );
    let report = check_spans(&mut documents, &mut reader, OffsetUnit::Byte)
        .await
        .unwrap();
    assert!(report.is_ok());
    assert_eq!(report.spans, 3);
}
