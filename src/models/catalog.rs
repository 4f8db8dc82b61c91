use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: String,
    pub brand: String,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceOperation {
    pub id: String,
    pub name: String,
    pub price: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Garage {
    pub id: String,
    pub name: String,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaySlots {
    pub date: String,
    pub slots: Vec<String>,
}

/// Built-in catalog used when the booking backend is unreachable, so the
/// conversation is never blocked on backend availability.
pub fn fallback_services() -> Vec<ServiceOperation> {
    [
        ("1", "Service Huile Moteur", 494.0),
        ("2", "Service microfiltre d'habitacle", 215.0),
        ("3", "Service filtre à carburant", 339.0),
        ("4", "Service filtre à air", 247.0),
        ("5", "Service liquide de freins", 409.0),
        ("6", "Service climatisation", 675.0),
        ("7", "Remplacement pneumatiques x4", 1062.0),
        ("8", "Contrôle technique", 439.0),
    ]
    .iter()
    .map(|(id, name, price)| ServiceOperation {
        id: id.to_string(),
        name: name.to_string(),
        price: Some(*price),
    })
    .collect()
}

pub fn fallback_garages() -> Vec<Garage> {
    [
        ("1", "ENVERGURE LA ROCHELLE", "48 Rue du 8 Mai 1945, 17138 Puilboreau"),
        ("2", "ROYAL SA MEYLAN", "1 bis Boulevard des Alpes, 38240 Meylan"),
        (
            "3",
            "PAYS DE LOIRE AUTOMOBILES NANTES",
            "104 Avenue des Lions, 44800 Saint-Herblain",
        ),
        ("4", "ALTITUDE 69 LYON", "6 Rue Joannès Carret, 69009 Lyon"),
        ("5", "INDIGO LES ULIS", "8 Avenue du Québec, 91140 Villebon-sur-Yvette"),
        ("6", "BMW NICE PREMIUM MOTORS", "116 Avenue Simone Veil, 06200 Nice"),
    ]
    .iter()
    .map(|(id, name, address)| Garage {
        id: id.to_string(),
        name: name.to_string(),
        address: address.to_string(),
    })
    .collect()
}

/// Maps a service keyword slug from the extractor to its static catalog entry.
pub fn service_for_slug(slug: &str) -> Option<ServiceOperation> {
    let id = match slug {
        "vidange" => "1",
        "freins" => "5",
        "climatisation" => "6",
        "pneus" => "7",
        "ct" => "8",
        _ => return None,
    };
    fallback_services().into_iter().find(|s| s.id == id)
}

/// Next `days` business days starting after `today`, with the standard
/// walk-in times. Used when the availabilities endpoint is down.
pub fn fallback_slots(today: NaiveDate, days: usize) -> Vec<DaySlots> {
    let times = ["09:00", "10:00", "14:00", "16:00"];
    let mut out = Vec::with_capacity(days);
    let mut date = today;
    while out.len() < days {
        date = date + Duration::days(1);
        if matches!(date.weekday(), Weekday::Sun) {
            continue;
        }
        out.push(DaySlots {
            date: date.format("%Y-%m-%d").to_string(),
            slots: times.iter().map(|t| t.to_string()).collect(),
        });
    }
    out
}
