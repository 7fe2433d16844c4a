//! Newick rendering of a merge list.
//!
//! Children are written right subtree first, branch lengths with two decimals; a branch
//! length is the parent's height minus the child's height (leaves sit at height zero).

use crate::linkage::{ClusterError, Merge};
use std::fmt::Write;

enum Step {
    Visit { node: usize, parent_height: f64 },
    Text(String),
}

/// Render the tree described by `merges` over leaves labelled `names`.
pub fn to_newick(merges: &[Merge], names: &[String]) -> Result<String, ClusterError> {
    let n = names.len();
    if n < 2 || merges.len() + 1 != n {
        return Err(ClusterError::MalformedTree(format!(
            "{} merges for {} leaves",
            merges.len(),
            n
        )));
    }
    let merge_of = move |node: usize| {
        node.checked_sub(n)
            .and_then(|k| merges.get(k))
            .ok_or_else(|| ClusterError::MalformedTree(format!("unknown cluster {node}")))
    };

    let root = merge_of(n + merges.len() - 1)?;
    let mut out = String::from("(");
    let mut stack = vec![
        Step::Text(");".to_string()),
        Step::Visit {
            node: root.left,
            parent_height: root.height,
        },
        Step::Text(",".to_string()),
        Step::Visit {
            node: root.right,
            parent_height: root.height,
        },
    ];
    while let Some(step) = stack.pop() {
        match step {
            Step::Text(text) => out.push_str(&text),
            Step::Visit {
                node,
                parent_height,
            } if node < n => {
                let _ = write!(out, "{}:{:.2}", names[node], parent_height);
            }
            Step::Visit {
                node,
                parent_height,
            } => {
                let merge = merge_of(node)?;
                out.push('(');
                stack.push(Step::Text(format!("):{:.2}", parent_height - merge.height)));
                stack.push(Step::Visit {
                    node: merge.left,
                    parent_height: merge.height,
                });
                stack.push(Step::Text(",".to_string()));
                stack.push(Step::Visit {
                    node: merge.right,
                    parent_height: merge.height,
                });
            }
        }
    }
    Ok(out)
}
