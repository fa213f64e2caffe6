use std::collections::HashSet;

use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::error::FetchError;
use crate::types::{MatchKey, OddsRecord};

/// Row containers, tried in order; the first selector with any hit wins.
const MATCH_ROW_SELECTORS: &[&str] = &[
    ".match-row",
    ".sport-event",
    "tr.match",
    "div.match",
    "div.event",
    "div.game",
];
const TEAM_SELECTOR: &str = ".team-name";
const MATCH_NAME_SELECTOR: &str = ".match-name";
const KICKOFF_SELECTOR: &str = ".match-time, .match-date";
const LEAGUE_SELECTOR: &str = ".league-name";
const ODDS_SELECTOR: &str = ".odd-value, .odds";

const DEFAULT_MARKET: &str = "1X2";
const DEFAULT_SELECTIONS: &[&str] = &["Home", "Draw", "Away"];
const UNKNOWN_LEAGUE: &str = "Unknown League";

/// Cell texts the bookmaker shows for a suspended or unpriced outcome.
const PLACEHOLDER_PRICES: &[&str] = &["", "-", "—", "n/a", "susp", "suspended"];

#[derive(Debug, Default)]
pub struct ParsedPage {
    pub records: Vec<OddsRecord>,
    pub rows_seen: usize,
    /// Rows without two team names.
    pub rows_skipped: usize,
    /// Odds cells showing a placeholder instead of a price.
    pub cells_unpriced: usize,
}

/// Extract odds from one league page.
///
/// Each match row yields one record per priced odds cell. Cells may carry
/// `data-market` / `data-selection`; unlabeled cells are read positionally as
/// 1X2 Home/Draw/Away. An empty page, or rows with no prices at all, is a
/// structure error: the layout changed and nothing should be stored.
pub fn parse_odds_page(
    html: &str,
    url: &str,
    collected_at: DateTime<Utc>,
) -> Result<ParsedPage, FetchError> {
    let doc = Html::parse_document(html);

    let team_sel = selector(TEAM_SELECTOR, url)?;
    let match_name_sel = selector(MATCH_NAME_SELECTOR, url)?;
    let kickoff_sel = selector(KICKOFF_SELECTOR, url)?;
    let league_sel = selector(LEAGUE_SELECTOR, url)?;
    let odds_sel = selector(ODDS_SELECTOR, url)?;

    let mut rows = Vec::new();
    for raw in MATCH_ROW_SELECTORS {
        let sel = selector(raw, url)?;
        rows = doc.select(&sel).collect::<Vec<_>>();
        if !rows.is_empty() {
            debug!("[PARSE] {} candidate rows via '{raw}' at {url}", rows.len());
            break;
        }
    }
    if rows.is_empty() {
        return Err(FetchError::Structure {
            url: url.to_string(),
            reason: "no match rows found".to_string(),
        });
    }

    let mut page = ParsedPage {
        rows_seen: rows.len(),
        ..ParsedPage::default()
    };

    for row in rows {
        let Some((home, away)) = team_names(row, &team_sel, &match_name_sel) else {
            page.rows_skipped += 1;
            continue;
        };
        let kickoff = first_text(row, &kickoff_sel).unwrap_or_default();
        let league = first_text(row, &league_sel)
            .or_else(|| ancestor_attr(row, "data-league"))
            .unwrap_or_else(|| UNKNOWN_LEAGUE.to_string());
        let match_key = MatchKey::new(home, away, kickoff);

        let mut positional = 0usize;
        for cell in row.select(&odds_sel) {
            let market = cell.value().attr("data-market").map(str::trim);
            let labeled = cell.value().attr("data-selection").map(str::trim);

            let (market, selection) = match labeled {
                Some(selection) => (market.unwrap_or(DEFAULT_MARKET), selection),
                None => {
                    let Some(selection) = DEFAULT_SELECTIONS.get(positional) else {
                        debug!("[PARSE] ignoring unlabeled odds cell #{positional} for {match_key}");
                        positional += 1;
                        continue;
                    };
                    positional += 1;
                    (market.unwrap_or(DEFAULT_MARKET), *selection)
                }
            };

            let text = element_text(cell);
            let Some(price) = parse_price(&text, url)? else {
                page.cells_unpriced += 1;
                continue;
            };

            page.records.push(OddsRecord {
                league: league.clone(),
                match_key: match_key.clone(),
                market: market.to_string(),
                selection: selection.to_string(),
                price,
                collected_at,
            });
        }
    }

    if page.records.is_empty() {
        return Err(FetchError::Structure {
            url: url.to_string(),
            reason: format!("{} rows matched but none carried odds", page.rows_seen),
        });
    }

    Ok(page)
}

/// Keep the first record for each key. Returns the kept records and how many
/// were dropped.
pub fn dedupe_records(records: Vec<OddsRecord>) -> (Vec<OddsRecord>, usize) {
    let mut seen = HashSet::new();
    let before = records.len();
    let kept: Vec<_> = records.into_iter().filter(|r| seen.insert(r.key())).collect();
    let dropped = before - kept.len();
    (kept, dropped)
}

/// `Ok(None)` for placeholder cells, an error for anything else that is not a number.
fn parse_price(text: &str, url: &str) -> Result<Option<f64>, FetchError> {
    let t = text.trim();
    if PLACEHOLDER_PRICES.iter().any(|p| t.eq_ignore_ascii_case(p)) {
        return Ok(None);
    }
    let price = t.replace(',', ".").parse::<f64>().map_err(|_| FetchError::Parse {
        url: url.to_string(),
        reason: format!("'{t}' is not a decimal price"),
    })?;
    if !price.is_finite() || price < 0.0 {
        return Err(FetchError::Parse {
            url: url.to_string(),
            reason: format!("'{t}' is not a decimal price"),
        });
    }
    Ok(Some(price))
}

fn team_names(row: ElementRef<'_>, team_sel: &Selector, match_name_sel: &Selector) -> Option<(String, String)> {
    let teams: Vec<String> = row
        .select(team_sel)
        .map(element_text)
        .filter(|t| !t.is_empty())
        .collect();
    if teams.len() >= 2 {
        return Some((teams[0].clone(), teams[1].clone()));
    }

    // "Arsenal vs Chelsea" in a single cell.
    let name = first_text(row, match_name_sel)?;
    let lower = name.to_ascii_lowercase();
    let idx = lower.find(" vs ").or_else(|| lower.find(" v "))?;
    let sep_len = if lower[idx..].starts_with(" vs ") { 4 } else { 3 };
    let home = name[..idx].trim();
    let away = name[idx + sep_len..].trim();
    if home.is_empty() || away.is_empty() {
        return None;
    }
    Some((home.to_string(), away.to_string()))
}

fn first_text(row: ElementRef<'_>, sel: &Selector) -> Option<String> {
    row.select(sel).map(element_text).find(|t| !t.is_empty())
}

fn ancestor_attr(row: ElementRef<'_>, attr: &str) -> Option<String> {
    std::iter::once(row)
        .chain(row.ancestors().filter_map(ElementRef::wrap))
        .find_map(|e| e.value().attr(attr))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Text content with runs of whitespace collapsed.
fn element_text(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn selector(raw: &str, url: &str) -> Result<Selector, FetchError> {
    Selector::parse(raw).map_err(|e| FetchError::Structure {
        url: url.to_string(),
        reason: format!("invalid selector '{raw}': {e:?}"),
    })
}
