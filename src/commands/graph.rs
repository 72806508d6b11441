use anyhow::{Context as AnyhowContext, Result};

use super::{open_storage, CommandRunner};
use crate::graph::{self, GraphFilter};
use crate::storage::Storage;
use crate::{cli, context};

impl CommandRunner for cli::GraphCmd {
    fn run(&self, ctx: &context::Context) -> Result<()> {
        let storage = open_storage(ctx)?;
        match self {
            cli::GraphCmd::Export {
                project,
                format,
                output,
            } => {
                let graph = storage
                    .read(|conn| graph::build_relationship_graph(conn, Some(*project), &GraphFilter::default()))
                    .with_context(|| format!("building graph for project {project}"))?;
                let document = match format {
                    cli::GraphFormat::Gexf => graph::export_gexf(&graph),
                    cli::GraphFormat::Graphml => graph::export_graphml(&graph),
                };
                match output {
                    Some(path) => {
                        std::fs::write(path, document).with_context(|| format!("writing {path}"))?;
                        log::info!(
                            "🕸️ Exported {} nodes and {} edges to {}",
                            graph.stats.node_count,
                            graph.stats.edge_count,
                            path
                        );
                    }
                    None => print!("{document}"),
                }
                Ok(())
            }
        }
    }
}
