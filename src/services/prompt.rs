//! Assembles the system prompt for the completion service: the booking rules,
//! the expected JSON reply shape, the facts known so far and the catalog
//! options for the current step.

use crate::models::session::{BookingSession, BookingStep};

/// Options shown per catalog to keep the reply presentable.
pub const MAX_OPTIONS: usize = 5;

const RULES: &str = "\
Tu es BOB, l'assistant de réservation du réseau Auto Service Pro.
Tu parles TOUJOURS en français, en 1 à 3 phrases courtes.
Tu guides le client à travers les étapes dans l'ordre, sans en sauter :
1 accueil, 2 plaque d'immatriculation (format AA-123-BB), 3 confirmation du
véhicule, 4 choix du service, 5 confirmation du service, 6 choix du garage,
7 confirmation du garage, 8 choix du créneau, 9 confirmation finale,
10 terminé.
Ne redemande jamais une information déjà validée et n'invente jamais de
données absentes du contexte. Si le client s'éloigne du sujet, ramène-le
poliment à l'étape en cours.";

const REPLY_FORMAT: &str = r#"Réponds UNIQUEMENT avec un objet JSON de cette forme :
{
  "message": "ta réponse au client",
  "currentStep": 1,
  "extractedData": {
    "licensePlate": null,
    "vehicleValidated": false,
    "serviceId": null,
    "serviceName": null,
    "serviceValidated": false,
    "garageId": null,
    "garageName": null,
    "garageValidated": false,
    "slotDate": null,
    "slotTime": null,
    "finalConfirmed": false
  }
}"#;

pub fn build_system_prompt(session: &BookingSession) -> String {
    let mut prompt = String::with_capacity(2048);
    prompt.push_str(RULES);
    prompt.push_str("\n\n");
    prompt.push_str(REPLY_FORMAT);

    prompt.push_str("\n\n# ÉTAPE ACTUELLE\n");
    prompt.push_str(&format!(
        "{} ({})\n",
        session.step.index(),
        session.step.as_str()
    ));

    prompt.push_str("\n# INFORMATIONS DÉJÀ VALIDÉES\n");
    prompt.push_str(&known_facts(session));

    if let Some(options) = options_for_step(session) {
        prompt.push_str("\n# OPTIONS À PROPOSER (utilise exclusivement ces données)\n");
        prompt.push_str(&options);
    }

    prompt
}

fn known_facts(session: &BookingSession) -> String {
    let mut facts = String::new();

    if let Some(plate) = &session.vehicle.license_plate {
        match (&session.vehicle.brand, &session.vehicle.model) {
            (Some(brand), Some(model)) => {
                facts.push_str(&format!("- Véhicule : {brand} {model} ({plate})\n"));
            }
            _ => facts.push_str(&format!("- Plaque : {plate}\n")),
        }
    }
    if let Some(name) = &session.service.name {
        facts.push_str(&format!("- Service : {name}\n"));
    }
    if let Some(name) = &session.garage.name {
        facts.push_str(&format!("- Garage : {name}\n"));
    }
    if let Some(date) = &session.appointment.date {
        let time = session.appointment.time.as_deref().unwrap_or("heure à définir");
        facts.push_str(&format!("- Créneau : {date} {time}\n"));
    }

    if facts.is_empty() {
        facts.push_str("(aucune pour le moment)\n");
    }
    facts
}

fn options_for_step(session: &BookingSession) -> Option<String> {
    match session.step {
        BookingStep::ChoosingService | BookingStep::ValidatingService => {
            let lines: Vec<String> = session
                .available_services
                .iter()
                .take(MAX_OPTIONS)
                .map(|s| match s.price {
                    Some(price) => format!("- [{}] {} ({price}€)", s.id, s.name),
                    None => format!("- [{}] {}", s.id, s.name),
                })
                .collect();
            (!lines.is_empty()).then(|| lines.join("\n") + "\n")
        }
        BookingStep::ChoosingGarage | BookingStep::ValidatingGarage => {
            let lines: Vec<String> = session
                .available_garages
                .iter()
                .take(MAX_OPTIONS)
                .map(|g| format!("- [{}] {} ({})", g.id, g.name, g.address))
                .collect();
            (!lines.is_empty()).then(|| lines.join("\n") + "\n")
        }
        BookingStep::ChoosingSlot => {
            let lines: Vec<String> = session
                .available_slots
                .iter()
                .take(MAX_OPTIONS)
                .map(|d| format!("- {} : {}", d.date, d.slots.join(", ")))
                .collect();
            (!lines.is_empty()).then(|| lines.join("\n") + "\n")
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::catalog::{fallback_garages, fallback_services};

    #[test]
    fn test_prompt_carries_step_and_facts() {
        let mut session = BookingSession::new();
        session.step = BookingStep::ChoosingService;
        session.vehicle.license_plate = Some("AB-123-CD".to_string());
        session.vehicle.brand = Some("Renault".to_string());
        session.vehicle.model = Some("Clio".to_string());
        session.available_services = fallback_services();

        let prompt = build_system_prompt(&session);
        assert!(prompt.contains("4 (choosing_service)"));
        assert!(prompt.contains("Renault Clio (AB-123-CD)"));
        assert!(prompt.contains("Service Huile Moteur"));
        assert!(prompt.contains("\"extractedData\""));
    }

    #[test]
    fn test_options_are_capped() {
        let mut session = BookingSession::new();
        session.step = BookingStep::ChoosingService;
        session.available_services = fallback_services();
        assert!(session.available_services.len() > MAX_OPTIONS);

        let prompt = build_system_prompt(&session);
        // The sixth catalog entry stays out of the prompt.
        assert!(!prompt.contains("Remplacement pneumatiques"));
    }

    #[test]
    fn test_no_options_section_before_catalog_fetch() {
        let mut session = BookingSession::new();
        session.step = BookingStep::ChoosingGarage;
        assert!(session.available_garages.is_empty());
        let prompt = build_system_prompt(&session);
        assert!(!prompt.contains("OPTIONS À PROPOSER"));

        session.available_garages = fallback_garages();
        let prompt = build_system_prompt(&session);
        assert!(prompt.contains("ALTITUDE 69 LYON"));
    }
}
