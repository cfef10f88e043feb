//! RDF file parsing and serialization helpers shared by the Merger and the
//! Exporter.

use std::io::{BufReader, Read, Seek};
use std::path::Path;

use anyhow::{anyhow, Result};
use log::debug;
use oxigraph::io::{RdfFormat, RdfParser, RdfSerializer};
use oxigraph::model::graph::Graph as OxigraphGraph;
use oxigraph::model::Dataset;

/// Maps a file extension to the RDF format it conventionally holds
/// (`.ttl`/`.n3` → Turtle, `.xml` → RdfXml, `.nt` → NTriples).
pub fn format_for_extension(path: &Path) -> Option<RdfFormat> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(|ext| match ext {
            "ttl" => Some(RdfFormat::Turtle),
            "xml" => Some(RdfFormat::RdfXml),
            "n3" => Some(RdfFormat::Turtle),
            "nt" => Some(RdfFormat::NTriples),
            _ => None,
        })
}

/// Parses a file into an in-memory `Graph`, trying the extension-implied
/// format first and falling back through Turtle, RdfXml, NTriples in turn
/// when the extension is absent or wrong.
pub fn read_file(path: &Path) -> Result<OxigraphGraph> {
    debug!("reading file: {}", path.display());
    let preferred = format_for_extension(path);
    let file = std::fs::File::open(path)?;
    let content = BufReader::new(file);
    read_format(content, preferred)
        .map_err(|e| anyhow!("failed to parse {}: {}", path.display(), e))
}

pub fn read_format<T: Read + Seek>(
    mut original_content: BufReader<T>,
    preferred: Option<RdfFormat>,
) -> Result<OxigraphGraph> {
    let mut candidates = vec![RdfFormat::Turtle, RdfFormat::RdfXml, RdfFormat::NTriples];
    if let Some(p) = preferred {
        candidates.retain(|f| *f != p);
        candidates.insert(0, p);
    }
    let mut last_err = None;
    for format in candidates {
        let content = original_content.get_mut();
        content.rewind()?;
        let parser = RdfParser::from_format(format).for_reader(content);
        let mut graph = OxigraphGraph::new();
        let mut failed = false;
        for quad in parser {
            match quad {
                Ok(q) => {
                    let triple = oxigraph::model::Triple::new(q.subject, q.predicate, q.object);
                    graph.insert(&triple);
                }
                Err(e) => {
                    last_err = Some(e);
                    failed = true;
                    break;
                }
            }
        }
        if !failed {
            return Ok(graph);
        }
    }
    Err(match last_err {
        Some(e) => anyhow!("no candidate RDF format parsed successfully: {}", e),
        None => anyhow!("no candidate RDF format parsed successfully"),
    })
}

/// Serializes a `Dataset` preserving graph-name, in the requested quad
/// format (e.g. TriG), used by the Exporter for the quad-capable artifact.
pub fn write_dataset_quads_to_file(
    dataset: &Dataset,
    path: &Path,
    format: RdfFormat,
) -> Result<()> {
    let mut file = std::fs::File::create(path)?;
    let mut serializer = RdfSerializer::from_format(format).for_writer(&mut file);
    for quad in dataset.iter() {
        serializer.serialize_quad(quad)?;
    }
    serializer.finish()?;
    Ok(())
}

/// Serializes a flat `Graph` (no graph-name) in the given format, used by
/// the Exporter for flat-triple artifacts.
pub fn write_graph_to_file(graph: &OxigraphGraph, path: &Path, format: RdfFormat) -> Result<()> {
    let mut file = std::fs::File::create(path)?;
    let mut serializer = RdfSerializer::from_format(format).for_writer(&mut file);
    for triple in graph.iter() {
        serializer.serialize_triple(triple)?;
    }
    serializer.finish()?;
    Ok(())
}
