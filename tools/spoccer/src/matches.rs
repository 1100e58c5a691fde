//! Parameter match listing

use anyhow::Result;
use colored::Colorize;
use spoc_reconcile::param_match::sort_matches;
use spoc_reconcile::{Indexer, MatchGroup, ParamMatch};

use crate::settings::SpoccerConfig;
use crate::utils::{coded, load_validated};

/// Matches of one location in processing order
pub fn collect_matches(config: &SpoccerConfig, root: &str, all: bool) -> Result<Vec<ParamMatch>> {
    let tree = load_validated(config)?;
    let indexer = Indexer::new(&tree, root).map_err(coded)?;
    let mut matches = indexer.parameter_matches(&tree, !all).map_err(coded)?;
    sort_matches(&mut matches);
    Ok(matches)
}

fn group_label(group: MatchGroup) -> colored::ColoredString {
    match group {
        MatchGroup::Empty => group.as_str().dimmed(),
        MatchGroup::H2goOnly => group.as_str().bright_cyan(),
        MatchGroup::TagOnly => group.as_str().yellow(),
        MatchGroup::Both => group.as_str().green(),
    }
}

pub fn handle_matches(config: &SpoccerConfig, root: &str, all: bool) -> Result<()> {
    let matches = collect_matches(config, root, all)?;
    println!(
        "\n{} {} parameter matches for {}",
        "*".bright_blue(),
        matches.len(),
        root.bright_yellow()
    );

    for param_match in &matches {
        let tag = param_match.tag().map(|tag| tag.raw()).unwrap_or("-");
        let file = param_match.file_pattern().unwrap_or("-");
        println!(
            "  {:<10} {:<16} {:<8} {} | {}",
            group_label(param_match.group()),
            param_match.key.to_string(),
            param_match.location(),
            tag,
            file
        );
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::utils::test_support::fixture_config;
    use tempfile::TempDir;

    #[test]
    fn test_matches_in_processing_order() {
        let dir = TempDir::new().unwrap();
        let matches = collect_matches(&fixture_config(dir.path()), "HL000001", false).unwrap();

        let groups: Vec<MatchGroup> = matches.iter().map(ParamMatch::group).collect();
        let mut sorted = groups.clone();
        sorted.sort();
        assert_eq!(groups, sorted);
        assert!(!groups.contains(&MatchGroup::Empty));

        let h2go_only: Vec<String> = matches
            .iter()
            .filter(|m| m.group() == MatchGroup::H2goOnly)
            .map(|m| m.key.to_string())
            .collect();
        assert_eq!(h2go_only, ["SL000001/SH", "SL000002/HANDH"]);
    }

    #[test]
    fn test_all_includes_empty_matches() {
        let dir = TempDir::new().unwrap();
        let config = fixture_config(dir.path());
        let filtered = collect_matches(&config, "HL000001", false).unwrap();
        let all = collect_matches(&config, "HL000001", true).unwrap();
        assert!(all.len() > filtered.len());
        assert_eq!(all[0].group(), MatchGroup::Empty);
    }
}
