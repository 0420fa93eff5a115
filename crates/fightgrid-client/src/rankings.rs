//! Parser for the rankings web page. The page carries no API contract, only
//! markup structure, so this is best-effort: division sections are located by
//! structural selectors and anything unrecognizable is dropped.

use scraper::{Html, Selector};
use thiserror::Error;

use fightgrid_core::classify::weight_class_in_text;
use fightgrid_core::WeightClass;

#[derive(Debug, Error)]
pub enum RankingsParseError {
    #[error("rankings markup query failed: {0}")]
    Selector(String),
}

/// One parsed row: the first listed name in a section is the champion
/// (rank 0), the next fifteen are ranks 1 through 15.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedEntry {
    pub weight_class: WeightClass,
    pub rank: i32,
    pub name: String,
}

const MAX_CONTENDER_RANK: i32 = 15;

fn selector(raw: &str) -> Result<Selector, RankingsParseError> {
    Selector::parse(raw).map_err(|e| RankingsParseError::Selector(e.to_string()))
}

/// Looks like a navigation label rather than a person.
fn is_ui_text(lower: &str) -> bool {
    lower == "view" || lower == "all" || lower.contains("view all") || lower.contains("ranking")
}

/// Extract the ranked lists from the rankings page HTML. Sections whose
/// header names no known division (the pound-for-pound list) are skipped;
/// entries past rank 15 are discarded.
pub fn parse_rankings(html: &str) -> Result<Vec<RankedEntry>, RankingsParseError> {
    let document = Html::parse_document(html);
    let section_sel = selector(".view-grouping")?;
    let header_sel = selector(".view-grouping-header")?;
    let link_sel = selector("a")?;

    let mut entries = Vec::new();
    for section in document.select(&section_sel) {
        let header = section
            .select(&header_sel)
            .next()
            .map(|n| n.text().collect::<String>())
            .unwrap_or_default();
        let Some(weight_class) = weight_class_in_text(&header) else {
            continue;
        };

        let mut next_rank = 0;
        for link in section.select(&link_sel) {
            let name = link.text().collect::<String>().trim().to_string();
            if name.len() < 3 || is_ui_text(&name.to_lowercase()) {
                continue;
            }
            if next_rank > MAX_CONTENDER_RANK {
                break;
            }
            entries.push(RankedEntry {
                weight_class,
                rank: next_rank,
                name,
            });
            next_rank += 1;
        }
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <div class="view-grouping">
          <div class="view-grouping-header">Pound-for-Pound Top Rank</div>
          <a href="/athlete/islam">Islam Makhachev</a>
        </div>
        <div class="view-grouping">
          <div class="view-grouping-header">Light Heavyweight</div>
          <a href="/rankings">View All Rankings</a>
          <a href="/athlete/alex">Alex Pereira</a>
          <a href="/athlete/magomed">Magomed Ankalaev</a>
          <a href="/athlete/jiri">Jiri Prochazka</a>
        </div>
        <div class="view-grouping">
          <div class="view-grouping-header">Women's Strawweight</div>
          <a href="/athlete/zhang">Zhang Weili</a>
        </div>
    "#;

    #[test]
    fn first_name_per_section_is_the_champion() {
        let entries = parse_rankings(PAGE).expect("parse");
        let lhw: Vec<_> = entries
            .iter()
            .filter(|e| e.weight_class == WeightClass::LightHeavyweight)
            .collect();
        assert_eq!(lhw.len(), 3);
        assert_eq!(lhw[0].rank, 0);
        assert_eq!(lhw[0].name, "Alex Pereira");
        assert_eq!(lhw[1].rank, 1);
        assert_eq!(lhw[2].rank, 2);
    }

    #[test]
    fn pound_for_pound_section_is_skipped() {
        let entries = parse_rankings(PAGE).expect("parse");
        assert!(entries.iter().all(|e| e.name != "Islam Makhachev"));
    }

    #[test]
    fn navigation_links_are_not_fighters() {
        let entries = parse_rankings(PAGE).expect("parse");
        assert!(entries.iter().all(|e| !e.name.contains("View")));
    }

    #[test]
    fn womens_section_maps_to_its_division() {
        let entries = parse_rankings(PAGE).expect("parse");
        let straw: Vec<_> = entries
            .iter()
            .filter(|e| e.weight_class == WeightClass::Strawweight)
            .collect();
        assert_eq!(straw.len(), 1);
        assert_eq!(straw[0].name, "Zhang Weili");
        assert_eq!(straw[0].rank, 0);
    }

    #[test]
    fn entries_past_rank_fifteen_are_discarded() {
        let mut links = String::new();
        for i in 0..20 {
            links.push_str(&format!("<a href=\"/a/{i}\">Fighter Number{i}</a>"));
        }
        let html = format!(
            r#"<div class="view-grouping">
                 <div class="view-grouping-header">Heavyweight</div>
                 {links}
               </div>"#
        );
        let entries = parse_rankings(&html).expect("parse");
        assert_eq!(entries.len(), 16);
        assert_eq!(entries.last().map(|e| e.rank), Some(15));
    }
}
