//! Field extractors over raw user text. All of them are total: no match is a
//! normal `None`, never an error.

use std::sync::LazyLock;

use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Weekday};
use regex::Regex;

use crate::models::session::Sentiment;

static PLATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Za-z]{2})[\s-]?(\d{3})[\s-]?([A-Za-z]{2})\b").unwrap());

/// French plate, with or without separators, normalized to `AA-123-BB`.
/// The pattern requires the full 7 alphanumerics, so partial candidates
/// never match.
pub fn extract_plate(message: &str) -> Option<String> {
    let caps = PLATE_RE.captures(message)?;
    Some(format!(
        "{}-{}-{}",
        caps[1].to_uppercase(),
        &caps[2],
        caps[3].to_uppercase()
    ))
}

/// Ordered (pattern, slug) rules; earlier entries win.
static SERVICE_RULES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"vidange|huile|entretien moteur", "vidange"),
        (r"pneu|roue|pneumatique", "pneus"),
        (r"contr[ôo]le technique|\bct\b", "ct"),
        (r"frein|plaquette|freinage", "freins"),
        (r"clim|air conditionn", "climatisation"),
    ]
    .iter()
    .map(|(pat, slug)| (Regex::new(pat).unwrap(), *slug))
    .collect()
});

pub fn extract_service(message: &str) -> Option<&'static str> {
    let lower = message.to_lowercase();
    SERVICE_RULES
        .iter()
        .find(|(re, _)| re.is_match(&lower))
        .map(|(_, slug)| *slug)
}

/// Ordered (pattern, garage id) rules over the known cities.
static GARAGE_RULES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"la rochelle|puilboreau", "1"),
        (r"meylan|grenoble", "2"),
        (r"nantes|saint-herblain|herblain", "3"),
        (r"lyon", "4"),
        (r"les ulis|villebon", "5"),
        (r"nice", "6"),
    ]
    .iter()
    .map(|(pat, id)| (Regex::new(pat).unwrap(), *id))
    .collect()
});

pub fn extract_garage(message: &str) -> Option<&'static str> {
    let lower = message.to_lowercase();
    GARAGE_RULES
        .iter()
        .find(|(re, _)| re.is_match(&lower))
        .map(|(_, id)| *id)
}

static EXPLICIT_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2})[/\-](\d{1,2})(?:[/\-](\d{4}))?\b").unwrap());

static MONTH_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(\d{1,2})\s+(janvier|février|fevrier|mars|avril|mai|juin|juillet|août|aout|septembre|octobre|novembre|décembre|decembre)\b",
    )
    .unwrap()
});

static IN_N_DAYS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"dans\s+(\d+)\s+jours?").unwrap());

fn month_number(name: &str) -> Option<u32> {
    let n = match name {
        "janvier" => 1,
        "février" | "fevrier" => 2,
        "mars" => 3,
        "avril" => 4,
        "mai" => 5,
        "juin" => 6,
        "juillet" => 7,
        "août" | "aout" => 8,
        "septembre" => 9,
        "octobre" => 10,
        "novembre" => 11,
        "décembre" | "decembre" => 12,
        _ => return None,
    };
    Some(n)
}

const WEEKDAYS: &[(&str, Weekday)] = &[
    ("lundi", Weekday::Mon),
    ("mardi", Weekday::Tue),
    ("mercredi", Weekday::Wed),
    ("jeudi", Weekday::Thu),
    ("vendredi", Weekday::Fri),
    ("samedi", Weekday::Sat),
    ("dimanche", Weekday::Sun),
];

fn next_weekday(today: NaiveDate, target: Weekday) -> NaiveDate {
    let current = today.weekday().num_days_from_monday() as i64;
    let wanted = target.num_days_from_monday() as i64;
    let mut delta = wanted - current;
    if delta <= 0 {
        delta += 7;
    }
    today + Duration::days(delta)
}

/// Resolves an explicit `D/M[/YYYY]`, `D <mois>`, weekday name or relative
/// expression to an absolute date. Relative terms are resolved against the
/// supplied `today`.
pub fn extract_date(message: &str, today: NaiveDate) -> Option<NaiveDate> {
    let lower = message.to_lowercase();

    if let Some(caps) = EXPLICIT_DATE_RE.captures(&lower) {
        let day: u32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let year: i32 = caps
            .get(3)
            .and_then(|y| y.as_str().parse().ok())
            .unwrap_or_else(|| today.year());
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            return Some(date);
        }
    }

    if let Some(caps) = MONTH_NAME_RE.captures(&lower) {
        let day: u32 = caps[1].parse().ok()?;
        let month = month_number(&caps[2])?;
        if let Some(date) = NaiveDate::from_ymd_opt(today.year(), month, day) {
            return Some(date);
        }
    }

    // "après-demain" must be checked before "demain".
    if lower.contains("après-demain")
        || lower.contains("apres-demain")
        || lower.contains("après demain")
        || lower.contains("apres demain")
    {
        return Some(today + Duration::days(2));
    }
    if lower.contains("demain") {
        return Some(today + Duration::days(1));
    }
    if lower.contains("aujourd'hui") || lower.contains("aujourd hui") {
        return Some(today);
    }

    if let Some(caps) = IN_N_DAYS_RE.captures(&lower) {
        let n: i64 = caps[1].parse().ok()?;
        if (1..31).contains(&n) {
            return Some(today + Duration::days(n));
        }
    }

    for (name, weekday) in WEEKDAYS {
        if lower.contains(name) {
            return Some(next_weekday(today, *weekday));
        }
    }

    if lower.contains("semaine prochaine") {
        return Some(today + Duration::days(7));
    }

    None
}

static TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2})\s*[h:]\s*([0-5]\d)?\b").unwrap());

/// `HH:MM`, `HHhMM` or `HHh`; minutes default to 00. Hours outside 0–23 are
/// rejected here; business-hours policy belongs to the engine.
pub fn extract_time(message: &str) -> Option<NaiveTime> {
    let lowercased = message.to_lowercase();
    let caps = TIME_RE.captures(&lowercased)?;
    let hour: u32 = caps[1].parse().ok()?;
    let minute: u32 = caps
        .get(2)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0);
    NaiveTime::from_hms_opt(hour, minute, 0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationSignal {
    Confirmed,
    Denied,
    /// Nothing recognized, or both sets matched (ambiguous).
    Neither,
}

const CONFIRM_KEYWORDS: &[&str] = &[
    "oui",
    "ok",
    "d'accord",
    "confirme",
    "confirmé",
    "parfait",
    "entendu",
    "ça marche",
    "c'est bon",
    "exact",
    "volontiers",
];

const DENY_KEYWORDS: &[&str] = &[
    "non",
    "pas d'accord",
    "incorrect",
    "erreur",
    "pas bon",
    "pas ça",
    "annule",
    "annuler",
    "annulation",
    "je refuse",
    "changer",
    "modifier",
];

fn matches_keyword(lower: &str, keyword: &str) -> bool {
    if keyword.contains(' ') || keyword.contains('\'') {
        return lower.contains(keyword);
    }
    lower
        .split(|c: char| !c.is_alphanumeric() && c != '\'')
        .any(|token| token == keyword)
}

/// Classifies a message as confirmation, denial or neither. A message that
/// matches both sets is reported as `Neither` to avoid false positives.
pub fn extract_confirmation(message: &str) -> ConfirmationSignal {
    let lower = message.to_lowercase();
    let confirmed = CONFIRM_KEYWORDS.iter().any(|k| matches_keyword(&lower, k));
    let denied = DENY_KEYWORDS.iter().any(|k| matches_keyword(&lower, k));

    match (confirmed, denied) {
        (true, false) => ConfirmationSignal::Confirmed,
        (false, true) => ConfirmationSignal::Denied,
        _ => ConfirmationSignal::Neither,
    }
}

const URGENCY_KEYWORDS: &[&str] = &[
    "urgent",
    "rapidement",
    "vite",
    "au plus tôt",
    "dès que possible",
    "immédiatement",
    "pressé",
    "express",
];

const FRUSTRATION_KEYWORDS: &[&str] = &[
    "pas compris",
    "ne comprend pas",
    "frustrant",
    "agaçant",
    "énervant",
    "ridicule",
    "absurde",
    "pénible",
    "j'ai déjà dit",
    "je répète",
    "toujours pas",
    "incompétent",
];

const POSITIVE_KEYWORDS: &[&str] = &[
    "merci",
    "parfait",
    "super",
    "excellent",
    "génial",
    "formidable",
    "cool",
    "sympa",
    "top",
    "content",
];

/// Keyword sets plus punctuation/caps heuristics. Last-message snapshot only.
pub fn extract_sentiment(message: &str) -> Sentiment {
    let lower = message.to_lowercase();
    let mut sentiment = Sentiment {
        urgent: URGENCY_KEYWORDS.iter().any(|k| lower.contains(k)),
        frustrated: FRUSTRATION_KEYWORDS.iter().any(|k| lower.contains(k)),
        positive: POSITIVE_KEYWORDS.iter().any(|k| lower.contains(k)),
    };

    if message.contains("!!!") || message.contains("???") {
        sentiment.frustrated = true;
    }
    let has_letters = message.chars().any(|c| c.is_alphabetic());
    if has_letters && message.len() > 10 && message == message.to_uppercase() {
        sentiment.frustrated = true;
    }

    sentiment
}

const INTENT_KEYWORDS: &[&str] = &[
    "rendez-vous",
    "rendez vous",
    "rdv",
    "réserver",
    "réservation",
    "reserver",
    "prendre",
    "venir",
    "passer",
];

/// The user is asking to book something.
pub fn has_booking_intent(message: &str) -> bool {
    let lower = message.to_lowercase();
    INTENT_KEYWORDS.iter().any(|k| lower.contains(k))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_plate_round_trip() {
        for raw in ["ab123cd", "AB 123 CD", "AB-123-CD", "ma plaque est ab-123-cd."] {
            assert_eq!(
                extract_plate(raw).as_deref(),
                Some("AB-123-CD"),
                "input: {raw}"
            );
        }
    }

    #[test]
    fn test_plate_rejects_partial() {
        assert!(extract_plate("ab12cd").is_none());
        assert!(extract_plate("AB-12-CD").is_none());
        assert!(extract_plate("123").is_none());
        assert!(extract_plate("").is_none());
    }

    #[test]
    fn test_service_first_match_wins() {
        assert_eq!(extract_service("je voudrais une vidange"), Some("vidange"));
        assert_eq!(extract_service("mes pneus sont usés"), Some("pneus"));
        assert_eq!(extract_service("le contrôle technique"), Some("ct"));
        // "vidange" rule precedes "freins" in the table.
        assert_eq!(
            extract_service("une vidange et les freins"),
            Some("vidange")
        );
        assert_eq!(extract_service("bonjour"), None);
    }

    #[test]
    fn test_service_ct_needs_word_boundary() {
        assert_eq!(extract_service("c'est exact"), None);
        assert_eq!(extract_service("un ct svp"), Some("ct"));
    }

    #[test]
    fn test_garage_by_city() {
        assert_eq!(extract_garage("le garage de Lyon"), Some("4"));
        assert_eq!(extract_garage("plutôt à NICE"), Some("6"));
        assert_eq!(extract_garage("peu importe"), None);
    }

    #[test]
    fn test_date_explicit() {
        let today = day("2026-05-01");
        assert_eq!(extract_date("le 22/05", today), Some(day("2026-05-22")));
        assert_eq!(
            extract_date("le 22/05/2027", today),
            Some(day("2027-05-22"))
        );
        assert_eq!(extract_date("le 15 juin", today), Some(day("2026-06-15")));
        assert_eq!(extract_date("le 32/05", today), None);
    }

    #[test]
    fn test_date_relative() {
        let today = day("2026-05-01"); // a Friday
        assert_eq!(extract_date("demain", today), Some(day("2026-05-02")));
        assert_eq!(extract_date("après-demain", today), Some(day("2026-05-03")));
        assert_eq!(extract_date("dans 3 jours", today), Some(day("2026-05-04")));
        // Next Monday after Friday 2026-05-01 is 2026-05-04.
        assert_eq!(extract_date("lundi matin", today), Some(day("2026-05-04")));
        // Same weekday rolls a full week forward.
        assert_eq!(extract_date("vendredi", today), Some(day("2026-05-08")));
        assert_eq!(extract_date("un de ces jours", today), None);
    }

    #[test]
    fn test_time_formats() {
        let t = |h, m| NaiveTime::from_hms_opt(h, m, 0).unwrap();
        assert_eq!(extract_time("à 10h"), Some(t(10, 0)));
        assert_eq!(extract_time("à 10h30"), Some(t(10, 30)));
        assert_eq!(extract_time("vers 14:15"), Some(t(14, 15)));
        assert_eq!(extract_time("à 25h"), None);
        assert_eq!(extract_time("demain"), None);
    }

    #[test]
    fn test_confirmation_and_denial() {
        assert_eq!(extract_confirmation("oui"), ConfirmationSignal::Confirmed);
        assert_eq!(
            extract_confirmation("Oui je confirme"),
            ConfirmationSignal::Confirmed
        );
        assert_eq!(extract_confirmation("non"), ConfirmationSignal::Denied);
        assert_eq!(
            extract_confirmation("c'est incorrect"),
            ConfirmationSignal::Denied
        );
        assert_eq!(
            extract_confirmation("je veux changer de garage"),
            ConfirmationSignal::Denied
        );
        assert_eq!(extract_confirmation("peut-être"), ConfirmationSignal::Neither);
    }

    #[test]
    fn test_ambiguous_confirmation_is_neither() {
        assert_eq!(
            extract_confirmation("oui enfin non"),
            ConfirmationSignal::Neither
        );
    }

    #[test]
    fn test_denial_does_not_match_inside_words() {
        // "bonjour" contains no standalone "non".
        assert_eq!(extract_confirmation("bonjour"), ConfirmationSignal::Neither);
    }

    #[test]
    fn test_sentiment_keywords_and_heuristics() {
        assert!(extract_sentiment("c'est urgent !").urgent);
        assert!(extract_sentiment("toujours pas de réponse").frustrated);
        assert!(extract_sentiment("merci beaucoup").positive);
        assert!(extract_sentiment("ALLO JE VOUS PARLE").frustrated);
        assert!(extract_sentiment("quoi ???").frustrated);

        let neutral = extract_sentiment("je voudrais un rendez-vous");
        assert!(!neutral.urgent && !neutral.frustrated && !neutral.positive);
    }

    #[test]
    fn test_booking_intent() {
        assert!(has_booking_intent("je souhaite prendre un rendez-vous"));
        assert!(has_booking_intent("un rdv pour ma voiture"));
        assert!(!has_booking_intent("quels sont vos horaires"));
    }
}
