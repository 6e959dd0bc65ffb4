//! Terminal output for the `daoctl` commands.
//!
//! Every function writes into an [`io::Write`] so the binary can hand over a
//! locked stdout and tests can hand over a `Vec<u8>`.

use std::io::{self, Write};

use serde::Serialize;
use time::OffsetDateTime;
use time::macros::format_description;

use docgraph_types::{Document, DocumentHash, Edge};

use crate::cache::{CacheStats, RestoreError};
use crate::graph::{Direction, EdgeChoice, Page, UNLABELED, truncate_label};

const LABEL_COLUMN: usize = 35;
const VALUE_COLUMN: usize = 65;
const CLEAN_LIMIT: usize = 65;
const CLEAN_KEEP: usize = 40;
const EDGE_NAME_COLUMN: usize = 12;

pub fn write_json<T: Serialize>(out: &mut impl Write, value: &T) -> io::Result<()> {
    let rendered = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
    writeln!(out, "{rendered}")
}

/// Strips newlines and cuts values longer than 65 characters down to 40.
pub fn clean_value(input: &str) -> String {
    let cleaned: String = input.chars().filter(|c| *c != '\n').collect();
    if cleaned.chars().count() > CLEAN_LIMIT {
        cleaned.chars().take(CLEAN_KEEP).collect()
    } else {
        cleaned
    }
}

pub fn display_date(value: OffsetDateTime) -> String {
    let format = format_description!("[year] [month repr:short] [day] [hour]:[minute]:[second]");
    value.format(&format).unwrap_or_else(|_| value.to_string())
}

fn label_of(document: &Document) -> String {
    document
        .node_label()
        .map(|label| truncate_label(&label))
        .unwrap_or_else(|| UNLABELED.to_string())
}

// ============================================================================
// Document
// ============================================================================

pub fn write_document(out: &mut impl Write, document: &Document) -> io::Result<()> {
    writeln!(out, "Document Details")?;
    writeln!(out)?;
    let rows = [
        ("ID", document.id.to_string()),
        ("Hash", document.hash.to_string()),
        ("Creator", document.creator.clone()),
        ("Created Date", display_date(document.created_date)),
    ];
    for (name, value) in rows {
        writeln!(out, "{name:<14}{value}")?;
    }
    writeln!(out)?;

    writeln!(out, "ContentGroups")?;
    for group in &document.content_groups {
        writeln!(out, "  ContentGroup")?;
        for content in group {
            let label = clean_value(&content.label);
            let value = clean_value(&content.value.to_string());
            writeln!(out, "    {label:<LABEL_COLUMN$}{value:<VALUE_COLUMN$}")?;
        }
    }
    writeln!(out)
}

// ============================================================================
// Navigation
// ============================================================================

/// One numbered line per choice, with the neighbor on the side the edge points.
pub fn choice_line(index: usize, choice: &EdgeChoice) -> String {
    let neighbor = format!("{} ({})", choice.neighbor_label, choice.neighbor_type);
    match choice.direction {
        Direction::Outbound => format!(
            "{index:>3}  [x] ---> {:<EDGE_NAME_COLUMN$} ---> {neighbor}",
            choice.edge_name
        ),
        Direction::Inbound => format!(
            "{index:>3}  {neighbor} ---> {:>EDGE_NAME_COLUMN$} ---> [x]",
            choice.edge_name
        ),
    }
}

/// Writes the visible choices, numbered by their position in the page.
pub fn write_choices(
    out: &mut impl Write,
    page: &Page,
    visible: &[(usize, &EdgeChoice)],
) -> io::Result<()> {
    writeln!(
        out,
        "from: node_label (type) ---> edge_name ---> [x] ---> edge_name ---> to: node_label (type)"
    )?;
    writeln!(out)?;
    for (index, choice) in visible {
        writeln!(out, "{}", choice_line(index + 1, choice))?;
    }
    if page.is_terminal() {
        write_end_marker(out)?;
    }
    writeln!(out)
}

pub fn write_end_marker(out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "----------")?;
    writeln!(out, "|  END   |")?;
    writeln!(out, "----------")
}

pub fn write_separator(out: &mut impl Write) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", "-".repeat(97))?;
    writeln!(out)
}

// ============================================================================
// Tables
// ============================================================================

pub fn write_documents(
    out: &mut impl Write,
    documents: &[Document],
    short_hash_len: usize,
) -> io::Result<()> {
    writeln!(
        out,
        "{:>8}  {:<hash$}  {:<13}  {:<20}  {}",
        "ID",
        "HASH",
        "CREATOR",
        "CREATED",
        "LABEL",
        hash = short_hash_len.max(4)
    )?;
    for document in documents {
        writeln!(
            out,
            "{:>8}  {:<hash$}  {:<13}  {:<20}  {}",
            document.id,
            document.hash.prefix(short_hash_len),
            document.creator,
            display_date(document.created_date),
            label_of(document),
            hash = short_hash_len.max(4)
        )?;
    }
    writeln!(out, "{} document(s)", documents.len())
}

/// Outbound then inbound edges of `hash`, each table ordered by creation time.
pub fn write_edges(
    out: &mut impl Write,
    hash: &DocumentHash,
    outbound: &[Edge],
    inbound: &[Edge],
    short_hash_len: usize,
) -> io::Result<()> {
    writeln!(out, "Edges of {hash}")?;
    writeln!(out)?;
    writeln!(out, "from this node")?;
    write_edge_table(out, outbound, short_hash_len)?;
    writeln!(out)?;
    writeln!(out, "to this node")?;
    write_edge_table(out, inbound, short_hash_len)
}

fn write_edge_table(out: &mut impl Write, edges: &[Edge], short_hash_len: usize) -> io::Result<()> {
    if edges.is_empty() {
        return writeln!(out, "  (none)");
    }

    let mut sorted: Vec<&Edge> = edges.iter().collect();
    sorted.sort_by_key(|edge| edge.created_date);

    let width = short_hash_len.max(4);
    writeln!(
        out,
        "  {:>8}  {:<width$}  {:<16}  {:<width$}  {}",
        "ID", "FROM", "EDGE", "TO", "CREATED"
    )?;
    for edge in sorted {
        writeln!(
            out,
            "  {:>8}  {:<width$}  {:<16}  {:<width$}  {}",
            edge.id,
            edge.from_node.prefix(short_hash_len),
            edge.edge_name,
            edge.to_node.prefix(short_hash_len),
            display_date(edge.created_date)
        )?;
    }
    Ok(())
}

// ============================================================================
// Cache
// ============================================================================

pub fn write_cache_stats(
    out: &mut impl Write,
    snapshot_path: &std::path::Path,
    stats: &CacheStats,
) -> io::Result<()> {
    writeln!(out, "snapshot      {}", snapshot_path.display())?;
    writeln!(out, "documents     {}", stats.documents)?;
    writeln!(out, "aliases       {}", stats.aliases)?;
    writeln!(out, "edges         {}", stats.edges)?;
    writeln!(out, "types         {}", stats.types)?;
    match stats.type_index_expires_at {
        Some(expires_at) => writeln!(out, "expires       {}", display_date(expires_at)),
        None => writeln!(out, "expires       -"),
    }
}

pub fn write_cache_unusable(
    out: &mut impl Write,
    snapshot_path: &std::path::Path,
    reason: &RestoreError,
) -> io::Result<()> {
    writeln!(out, "snapshot      {}", snapshot_path.display())?;
    writeln!(out, "unusable      {reason}")
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use time::macros::datetime;

    use super::*;
    use crate::graph::UNTYPED;
    use crate::testing::{document, edge};

    fn render(f: impl FnOnce(&mut Vec<u8>) -> io::Result<()>) -> String {
        let mut out = Vec::new();
        f(&mut out).expect("write to vec");
        String::from_utf8(out).expect("utf8 output")
    }

    fn page(primary: Document, outbound: Vec<Edge>, choices: Vec<EdgeChoice>) -> Page {
        Page {
            primary,
            outbound,
            inbound: Vec::new(),
            choices,
        }
    }

    fn choice(name: &str, direction: Direction) -> EdgeChoice {
        EdgeChoice {
            edge_name: name.to_string(),
            direction,
            neighbor: crate::testing::hash_for(name),
            neighbor_type: "member".to_string(),
            neighbor_label: "alice".to_string(),
            created_date: datetime!(2021-01-01 00:00 UTC),
        }
    }

    #[test]
    fn clean_value_strips_newlines_and_truncates_long_values() {
        assert_eq!(clean_value("a\nb"), "ab");
        let long = "x".repeat(70);
        assert_eq!(clean_value(&long).len(), 40);
        let edge = "y".repeat(65);
        assert_eq!(clean_value(&edge), edge);
    }

    #[test]
    fn document_details_list_header_fields_and_contents() {
        let doc = document(3, "alice", "member");
        let text = render(|out| write_document(out, &doc));

        assert!(text.starts_with("Document Details"));
        assert!(text.contains(&format!("Hash          {}", doc.hash)));
        assert!(text.contains("Creator       dao.hypha"));
        assert!(text.contains("Created Date  1970 Jan 04 00:00:00"));
        assert!(text.contains("  ContentGroup"));
        assert!(text.contains(&format!("    {:<35}{:<65}", "type", "member")));
    }

    #[test]
    fn choice_lines_point_the_way_the_edge_points() {
        let out = choice_line(1, &choice("owns", Direction::Outbound));
        let inc = choice_line(2, &choice("owned_by", Direction::Inbound));

        assert_eq!(out, "  1  [x] ---> owns         ---> alice (member)");
        assert_eq!(inc, "  2  alice (member) --->     owned_by ---> [x]");
    }

    #[test]
    fn terminal_page_renders_end_marker() {
        let choices = vec![choice("member", Direction::Inbound)];
        let terminal = page(document(1, "a", "dho"), Vec::new(), choices.clone());
        let visible: Vec<_> = terminal.choices.iter().enumerate().collect();
        let text = render(|out| write_choices(out, &terminal, &visible));
        assert!(text.contains("|  END   |"));

        let outbound = edge(
            1,
            &document(1, "a", "dho"),
            &document(2, "b", UNTYPED),
            "member",
            datetime!(2021-01-01 00:00 UTC),
        );
        let open = page(document(1, "a", "dho"), vec![outbound], choices);
        let visible: Vec<_> = open.choices.iter().enumerate().collect();
        let text = render(|out| write_choices(out, &open, &visible));
        assert!(!text.contains("END"));
    }

    #[test]
    fn edge_tables_are_sorted_by_creation_time() {
        let a = document(1, "a", "dho");
        let b = document(2, "b", "member");
        let late = edge(7, &a, &b, "late", datetime!(2022-01-01 00:00 UTC));
        let early = edge(8, &a, &b, "early", datetime!(2020-01-01 00:00 UTC));
        let text = render(|out| write_edges(out, &a.hash, &[late, early], &[], 5));

        let early_at = text.find("early").expect("early row");
        let late_at = text.find("late").expect("late row");
        assert!(early_at < late_at);
        assert!(text.contains("(none)"));
    }

    #[test]
    fn documents_table_uses_short_hashes() {
        let docs = vec![document(1, "alice", "member")];
        let text = render(|out| write_documents(out, &docs, 5));
        assert!(text.contains(docs[0].hash.prefix(5)));
        assert!(!text.contains(docs[0].hash.as_str()));
        assert!(text.contains("1 document(s)"));
    }

    #[test]
    fn cache_status_reports_reason_when_unusable() {
        let text = render(|out| {
            write_cache_unusable(out, Path::new(".graph.cache"), &RestoreError::MissingTypeIndex)
        });
        assert!(text.contains("unusable      snapshot has no live type index"));
    }
}
