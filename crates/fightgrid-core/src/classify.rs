//! Classification of ambiguous, multi-sourced raw fields into the closed
//! enumerations of the data model. Pure functions, no I/O.

use chrono::{DateTime, Utc};

use crate::normalize::normalize_label;
use crate::{EventKind, FightStatus, Gender, Stance, WeightClass};

/// Free-text scan order for division names. Light Heavyweight must be tried
/// before Heavyweight, which it contains.
const TEXT_SCAN: &[(&str, WeightClass)] = &[
    ("strawweight", WeightClass::Strawweight),
    ("flyweight", WeightClass::Flyweight),
    ("bantamweight", WeightClass::Bantamweight),
    ("featherweight", WeightClass::Featherweight),
    ("lightweight", WeightClass::Lightweight),
    ("welterweight", WeightClass::Welterweight),
    ("middleweight", WeightClass::Middleweight),
    ("light heavyweight", WeightClass::LightHeavyweight),
    ("heavyweight", WeightClass::Heavyweight),
    ("catchweight", WeightClass::Catchweight),
];

/// Map a profile-declared weight-class label to a division via the fixed
/// name table. Unknown labels yield None, never a Catchweight default; the
/// sentinel is only substituted at fight persist-time.
pub fn weight_class_from_label(raw: &str) -> Option<WeightClass> {
    let mut key = normalize_label(raw);
    if let Some(stripped) = key.strip_prefix("WOMENS") {
        key = stripped.to_string();
    }
    match key.as_str() {
        "STRAWWEIGHT" => Some(WeightClass::Strawweight),
        "FLYWEIGHT" => Some(WeightClass::Flyweight),
        "BANTAMWEIGHT" => Some(WeightClass::Bantamweight),
        "FEATHERWEIGHT" => Some(WeightClass::Featherweight),
        "LIGHTWEIGHT" => Some(WeightClass::Lightweight),
        "WELTERWEIGHT" => Some(WeightClass::Welterweight),
        "MIDDLEWEIGHT" => Some(WeightClass::Middleweight),
        "LIGHTHEAVYWEIGHT" | "LHEAVYWEIGHT" => Some(WeightClass::LightHeavyweight),
        "HEAVYWEIGHT" => Some(WeightClass::Heavyweight),
        "SUPERHEAVYWEIGHT" => Some(WeightClass::SuperHeavyweight),
        _ => None,
    }
}

/// Scan free text (a bout annotation, an event name) for a known division
/// name. First table hit wins.
pub fn weight_class_in_text(text: &str) -> Option<WeightClass> {
    let lower = text.to_lowercase();
    TEXT_SCAN
        .iter()
        .find(|(needle, _)| lower.contains(needle))
        .map(|(_, wc)| *wc)
}

/// Division detection for a bout: annotation headlines first, then the event
/// display name.
pub fn detect_weight_class<'a>(
    annotations: impl IntoIterator<Item = &'a str>,
    event_name: &str,
) -> Option<WeightClass> {
    for note in annotations {
        if let Some(wc) = weight_class_in_text(note) {
            return Some(wc);
        }
    }
    weight_class_in_text(event_name)
}

/// Classify gender from prioritized signals, stopping at the first positive:
/// an explicit profile value always wins; otherwise a feminine-division
/// marker anywhere in the bout/event context text; otherwise a declared
/// division that is women-only; otherwise the Male default.
pub fn classify_gender<'a>(
    profile_value: Option<&str>,
    context_texts: impl IntoIterator<Item = &'a str>,
    declared: Option<WeightClass>,
) -> Gender {
    if let Some(value) = profile_value {
        let value = value.trim();
        if !value.is_empty() {
            return if value.eq_ignore_ascii_case("female") {
                Gender::Female
            } else {
                Gender::Male
            };
        }
    }
    for text in context_texts {
        if text.to_lowercase().contains("women") {
            return Gender::Female;
        }
    }
    if declared.map_or(false, |wc| wc.women_only()) {
        return Gender::Female;
    }
    Gender::Male
}

/// Only the three known stances are accepted; anything else is Unknown.
pub fn classify_stance(raw: Option<&str>) -> Stance {
    match raw.map(str::trim) {
        Some(value) if value.eq_ignore_ascii_case("orthodox") => Stance::Orthodox,
        Some(value) if value.eq_ignore_ascii_case("southpaw") => Stance::Southpaw,
        Some(value) if value.eq_ignore_ascii_case("switch") => Stance::Switch,
        _ => Stance::Unknown,
    }
}

/// Map the upstream status-state token to a fight status. An explicit cancel
/// token always wins; a past event date corroborates "completed" even when
/// the token is ambiguous or missing.
pub fn classify_fight_status(
    state_token: Option<&str>,
    completed_flag: bool,
    event_date: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> FightStatus {
    let state = state_token.map(|s| s.to_lowercase()).unwrap_or_default();
    if state.contains("cancel") {
        return FightStatus::Cancelled;
    }
    let in_past = event_date.map_or(false, |date| date < now);
    if state == "post" || state == "final" || completed_flag || in_past {
        return FightStatus::Completed;
    }
    FightStatus::Scheduled
}

/// Overall record summary "W-L-D" or "W-L-D-NC". Malformed segments parse
/// as zero.
pub fn parse_record_summary(summary: &str) -> (i32, i32, i32, i32) {
    let mut parts = summary.split('-');
    let mut next = || {
        parts
            .next()
            .and_then(|p| p.trim().parse::<i32>().ok())
            .unwrap_or(0)
    };
    (next(), next(), next(), next())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WinMethod {
    Knockout,
    Submission,
    Decision,
}

/// Match a record-breakdown category label against the known synonym set.
pub fn win_method_for_label(name: Option<&str>, display_name: Option<&str>) -> Option<WinMethod> {
    let name = name.unwrap_or_default();
    let display = display_name.unwrap_or_default();
    if name.eq_ignore_ascii_case("ko/tko") || display.to_uppercase().contains("KO") {
        return Some(WinMethod::Knockout);
    }
    if name.eq_ignore_ascii_case("submissions") || display.to_lowercase().contains("sub") {
        return Some(WinMethod::Submission);
    }
    if name.eq_ignore_ascii_case("decisions") || display.to_lowercase().contains("dec") {
        return Some(WinMethod::Decision);
    }
    None
}

/// Title-series cards are named "<short code> <number>".
pub fn classify_event_kind(event_name: &str, org_short_name: &str) -> EventKind {
    if org_short_name.is_empty() {
        return EventKind::FightNight;
    }
    let mut rest = event_name;
    while let Some(pos) = rest.find(org_short_name) {
        let after = &rest[pos + org_short_name.len()..];
        let mut chars = after.chars();
        if chars.next() == Some(' ') && chars.next().map_or(false, |c| c.is_ascii_digit()) {
            return EventKind::Ppv;
        }
        rest = &rest[pos + org_short_name.len()..];
    }
    EventKind::FightNight
}

/// Upstream reports height and reach in inches.
pub fn inches_to_cm(inches: f64) -> i32 {
    (inches * 2.54).round() as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).single().expect("valid date")
    }

    #[test]
    fn label_lookup_covers_abbreviations_and_womens_prefix() {
        assert_eq!(weight_class_from_label("Lightweight"), Some(WeightClass::Lightweight));
        assert_eq!(
            weight_class_from_label("Light Heavyweight"),
            Some(WeightClass::LightHeavyweight)
        );
        assert_eq!(
            weight_class_from_label("L.Heavyweight"),
            Some(WeightClass::LightHeavyweight)
        );
        assert_eq!(
            weight_class_from_label("Women's Strawweight"),
            Some(WeightClass::Strawweight)
        );
        assert_eq!(weight_class_from_label("Openweight"), None);
        assert_eq!(weight_class_from_label(""), None);
    }

    #[test]
    fn text_scan_prefers_light_heavyweight_over_heavyweight() {
        assert_eq!(
            weight_class_in_text("Light Heavyweight Championship Bout"),
            Some(WeightClass::LightHeavyweight)
        );
        assert_eq!(
            weight_class_in_text("Heavyweight title fight"),
            Some(WeightClass::Heavyweight)
        );
        assert_eq!(weight_class_in_text("Main card opener"), None);
    }

    #[test]
    fn detection_checks_annotations_before_event_name() {
        let wc = detect_weight_class(
            ["Bantamweight bout"],
            "FG Fight Night: Lightweight showcase",
        );
        assert_eq!(wc, Some(WeightClass::Bantamweight));

        let wc = detect_weight_class([], "FG Fight Night: Lightweight showcase");
        assert_eq!(wc, Some(WeightClass::Lightweight));
    }

    #[test]
    fn gender_marker_token_promotes_to_female() {
        let gender = classify_gender(None, ["Women's Flyweight Title Bout"], None);
        assert_eq!(gender, Gender::Female);
    }

    #[test]
    fn explicit_profile_gender_beats_conflicting_context() {
        let gender = classify_gender(Some("Male"), ["Women's Flyweight Title Bout"], None);
        assert_eq!(gender, Gender::Male);
        let gender = classify_gender(Some("female"), [], None);
        assert_eq!(gender, Gender::Female);
    }

    #[test]
    fn women_only_division_promotes_when_no_other_signal() {
        let gender = classify_gender(None, [], Some(WeightClass::Strawweight));
        assert_eq!(gender, Gender::Female);
        let gender = classify_gender(None, [], Some(WeightClass::Lightweight));
        assert_eq!(gender, Gender::Male);
    }

    #[test]
    fn stance_outside_closed_set_is_unknown() {
        assert_eq!(classify_stance(Some("Southpaw")), Stance::Southpaw);
        assert_eq!(classify_stance(Some("ORTHODOX")), Stance::Orthodox);
        assert_eq!(classify_stance(Some("karate")), Stance::Unknown);
        assert_eq!(classify_stance(None), Stance::Unknown);
    }

    #[test]
    fn cancel_token_wins_even_for_past_events() {
        let status = classify_fight_status(
            Some("STATUS_CANCELED"),
            false,
            Some(at(2020, 1, 1)),
            at(2026, 1, 1),
        );
        assert_eq!(status, FightStatus::Cancelled);
    }

    #[test]
    fn past_event_date_corroborates_completed() {
        let status = classify_fight_status(Some("pre"), false, Some(at(2020, 1, 1)), at(2026, 1, 1));
        assert_eq!(status, FightStatus::Completed);
        let status = classify_fight_status(None, false, Some(at(2030, 1, 1)), at(2026, 1, 1));
        assert_eq!(status, FightStatus::Scheduled);
        let status = classify_fight_status(Some("post"), false, None, at(2026, 1, 1));
        assert_eq!(status, FightStatus::Completed);
    }

    #[test]
    fn record_summary_tolerates_missing_no_contest_segment() {
        assert_eq!(parse_record_summary("27-1-0"), (27, 1, 0, 0));
        assert_eq!(parse_record_summary("14-3-0-2"), (14, 3, 0, 2));
        assert_eq!(parse_record_summary("garbage"), (0, 0, 0, 0));
    }

    #[test]
    fn win_method_labels_match_known_synonyms() {
        assert_eq!(
            win_method_for_label(Some("KO/TKO"), None),
            Some(WinMethod::Knockout)
        );
        assert_eq!(
            win_method_for_label(None, Some("(T)KO wins")),
            Some(WinMethod::Knockout)
        );
        assert_eq!(
            win_method_for_label(Some("Submissions"), None),
            Some(WinMethod::Submission)
        );
        assert_eq!(
            win_method_for_label(None, Some("Decision wins")),
            Some(WinMethod::Decision)
        );
        assert_eq!(win_method_for_label(Some("overall"), None), None);
    }

    #[test]
    fn numbered_cards_are_title_series() {
        assert_eq!(classify_event_kind("FG 309: Jones vs Miocic", "FG"), EventKind::Ppv);
        assert_eq!(
            classify_event_kind("FG Fight Night: Cannonier vs Borralho", "FG"),
            EventKind::FightNight
        );
        assert_eq!(classify_event_kind("Road to FG 100", "FG"), EventKind::Ppv);
    }

    #[test]
    fn height_conversion_rounds_to_whole_centimeters() {
        assert_eq!(inches_to_cm(76.0), 193);
        assert_eq!(inches_to_cm(69.5), 177);
    }
}
