//! Human-readable rendering of engine results

use navtree_core::{Children, Indicator, MoveOutcome, RenderResult, RenderedNode, TreeReport};

/// Indented outline of a render result, one node per line
pub(crate) fn outline(result: &RenderResult) -> String {
    let mut out = String::new();
    for node in &result.nodes {
        write_node(&mut out, node, 0);
    }
    out.push_str(&format!(
        "{} node(s){}\n",
        result.node_count,
        if result.incomplete { ", incomplete" } else { "" }
    ));
    out
}

fn write_node(out: &mut String, node: &RenderedNode, indent: usize) {
    let marker = match &node.children {
        Children::Leaf => "-",
        Children::Expanded(_) if node.open => "v",
        Children::Expanded(_) => ">",
        Children::Lazy(_) => "+",
    };
    let mut line = format!("{:width$}{marker} {} [{}]", "", node.name, node.id, width = indent * 2);
    for tag in tags(node) {
        line.push(' ');
        line.push_str(&tag);
    }
    out.push_str(&line);
    out.push('\n');
    for child in node.expanded_children() {
        write_node(out, child, indent + 1);
    }
}

fn tags(node: &RenderedNode) -> Vec<String> {
    let mut tags: Vec<String> = node
        .indicators
        .iter()
        .map(|i| match i {
            Indicator::Hidden => "(hidden)".to_string(),
            Indicator::ExternalLink { url } => format!("(link {url})"),
            Indicator::Lock => "(lock)".to_string(),
        })
        .collect();
    let flags = node.flags;
    if flags.active_connected {
        tags.push("*active".to_string());
    }
    if flags.other_connected {
        tags.push("*pages".to_string());
    }
    if flags.restricted {
        tags.push("*portal".to_string());
    }
    if flags.translation_fallback {
        tags.push("*untranslated".to_string());
    }
    tags
}

pub(crate) fn move_summary(outcome: &MoveOutcome) -> String {
    if !outcome.success {
        return "move rejected\n".to_string();
    }
    let ids: Vec<String> = outcome.affected.iter().map(ToString::to_string).collect();
    let mut line = format!("moved; affected: {}", ids.join(", "));
    if outcome.maintenance_pending {
        line.push_str(" (maintenance pending, replay the recovery log)");
    }
    line.push('\n');
    line
}

pub(crate) fn report(report: &TreeReport) -> String {
    let mut out = format!("{} node(s) checked\n", report.nodes);
    for group in &report.non_contiguous {
        out.push_str(&format!("non-contiguous keys under {}: {:?}\n", group.parent, group.keys));
    }
    for id in &report.stale_paths {
        out.push_str(&format!("stale path cache: {id}\n"));
    }
    for id in &report.bounds_drift {
        out.push_str(&format!("nested-set drift: {id}\n"));
    }
    if report.is_clean() {
        out.push_str("clean\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use navtree_core::{LazyPlaceholder, NodeFlags};
    use pretty_assertions::assert_eq;

    fn node(id: &str, children: Children) -> RenderedNode {
        RenderedNode {
            id: id.into(),
            external_id: None,
            name: id.to_uppercase(),
            depth: 0,
            is_root: false,
            open: true,
            flags: NodeFlags::default(),
            indicators: Vec::new(),
            primary_page: None,
            children,
        }
    }

    #[test]
    fn outline_indents_and_marks_children() {
        let mut leaf = node("b", Children::Leaf);
        leaf.indicators = vec![Indicator::Hidden, Indicator::Lock];
        leaf.flags.active_connected = true;
        let lazy = node(
            "c",
            Children::Lazy(LazyPlaceholder {
                parent_id: "c".into(),
                tree_table: "cms_tree".into(),
                selected_page: None,
            }),
        );
        let result = RenderResult {
            nodes: vec![node("a", Children::Expanded(vec![leaf, lazy]))],
            node_count: 3,
            incomplete: false,
        };

        assert_eq!(
            outline(&result),
            "v A [a]\n  - B [b] (hidden) (lock) *active\n  + C [c]\n3 node(s)\n"
        );
    }

    #[test]
    fn clean_report_says_so() {
        let text = report(&TreeReport {
            nodes: 4,
            ..TreeReport::default()
        });
        assert_eq!(text, "4 node(s) checked\nclean\n");
    }

    #[test]
    fn rejected_move_summary() {
        assert_eq!(move_summary(&MoveOutcome::failed()), "move rejected\n");
    }

    #[test]
    fn report_lists_every_violation() {
        let text = report(&TreeReport {
            nodes: 3,
            non_contiguous: vec![navtree_core::verify::GroupViolation {
                parent: "p".into(),
                keys: vec![0, 2],
            }],
            stale_paths: vec!["a".into()],
            bounds_drift: vec!["b".into()],
        });
        assert_eq!(
            text,
            "3 node(s) checked\nnon-contiguous keys under p: [0, 2]\nstale path cache: a\nnested-set drift: b\n"
        );
    }
}
