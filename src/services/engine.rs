//! Per-turn orchestration: extractors first, the completion service only when
//! no deterministic fast path fires, then state transitions and backend
//! effects. Nothing below this boundary is allowed to surface an error to the
//! caller; every external failure degrades to a canned French reply.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDate, NaiveTime, Timelike};

use crate::models::catalog::{self, Garage, ServiceOperation};
use crate::models::session::{
    BookingSession, BookingStep, Sentiment, ServiceRecord, VehicleRecord,
};
use crate::models::turn::NormalizedTurnResponse;
use crate::services::ai::Message;
use crate::services::backend::AppointmentRequest;
use crate::services::extractors::{
    extract_confirmation, extract_date, extract_garage, extract_plate, extract_sentiment,
    extract_service, extract_time, has_booking_intent, ConfirmationSignal,
};
use crate::services::normalizer::normalize;
use crate::services::prompt::{self, MAX_OPTIONS};
use crate::services::registry::INFLIGHT_STALE_AFTER;
use crate::state::AppState;

/// Opening hour (inclusive) and closing hour (exclusive) for slot starts.
const BUSINESS_HOURS: (u32, u32) = (8, 19);

const BUSY_REPLY: &str =
    "Je traite encore votre message précédent, un instant s'il vous plaît...";

#[derive(Debug)]
pub struct TurnOutcome {
    pub reply: String,
    pub step: BookingStep,
}

pub async fn process_turn(state: &Arc<AppState>, session_id: &str, message: &str) -> TurnOutcome {
    let handle = state.sessions.handle(session_id);

    if !handle.try_begin_turn(INFLIGHT_STALE_AFTER) {
        tracing::debug!(session = session_id, "turn rejected, session busy");
        return TurnOutcome {
            reply: BUSY_REPLY.to_string(),
            step: handle.last_step(),
        };
    }

    let mut session = handle.session.lock().await;
    session.turn_count += 1;
    session.sentiment = extract_sentiment(message);

    let today = Local::now().date_naive();
    let reply = run_turn(state, &mut session, message, today).await;
    let reply = adapt_to_sentiment(reply, session.sentiment);

    session.push_history("user", message);
    session.push_history("assistant", &reply);

    let step = session.step;
    tracing::info!(
        session = session_id,
        step = step.as_str(),
        turn = session.turn_count,
        "turn processed"
    );
    drop(session);
    handle.end_turn(step);

    TurnOutcome { reply, step }
}

async fn run_turn(
    state: &Arc<AppState>,
    session: &mut BookingSession,
    message: &str,
    today: NaiveDate,
) -> String {
    let confirmation = extract_confirmation(message);

    // An explicit denial while a confirmation is pending wins over everything.
    let confirmation_pending = matches!(
        session.step,
        BookingStep::ValidatingVehicle
            | BookingStep::ValidatingService
            | BookingStep::ValidatingGarage
            | BookingStep::FinalConfirmation
    );
    if confirmation_pending && confirmation == ConfirmationSignal::Denied {
        return handle_denial(state, session).await;
    }

    // A syntactically valid plate is higher-precision than the model.
    if session.step <= BookingStep::ValidatingVehicle {
        if let Some(plate) = extract_plate(message) {
            return accept_plate(state, session, plate).await;
        }
    }

    match session.step {
        BookingStep::AwaitingIntent => {
            if has_booking_intent(message) {
                session.step = BookingStep::AwaitingPlate;
                return "Avec plaisir ! Pour commencer, pouvez-vous m'indiquer votre plaque \
                        d'immatriculation (format AA-123-BB) ?"
                    .to_string();
            }
            llm_turn(state, session, message, today).await
        }

        BookingStep::AwaitingPlate => llm_turn(state, session, message, today).await,

        BookingStep::ValidatingVehicle => {
            if confirmation == ConfirmationSignal::Confirmed
                && session.vehicle.license_plate.is_some()
            {
                session.vehicle.confirmed = true;
                session.advance();
                ensure_services(state, session).await;
                return format!(
                    "Parfait ! Voici les services que nous proposons :\n{}\nLequel souhaitez-vous ?",
                    list_services(session)
                );
            }
            llm_turn(state, session, message, today).await
        }

        BookingStep::ChoosingService => {
            ensure_services(state, session).await;
            if let Some(slug) = extract_service(message) {
                if let Some(op) = resolve_service(session, slug) {
                    set_service(session, op);
                    session.advance();
                    return service_confirm_prompt(session);
                }
            }
            llm_turn(state, session, message, today).await
        }

        BookingStep::ValidatingService => {
            if confirmation == ConfirmationSignal::Confirmed && session.service.id.is_some() {
                session.service.confirmed = true;
                session.advance();
                ensure_garages(state, session).await;
                return format!(
                    "Très bien. Dans quel garage souhaitez-vous venir ?\n{}",
                    list_garages(session)
                );
            }
            // The user may pick another service instead of answering.
            if let Some(slug) = extract_service(message) {
                if let Some(op) = resolve_service(session, slug) {
                    set_service(session, op);
                    return service_confirm_prompt(session);
                }
            }
            llm_turn(state, session, message, today).await
        }

        BookingStep::ChoosingGarage => {
            ensure_garages(state, session).await;
            if let Some(id) = extract_garage(message) {
                if let Some(garage) = resolve_garage(session, id) {
                    set_garage(session, garage);
                    session.advance();
                    return garage_confirm_prompt(session);
                }
            }
            llm_turn(state, session, message, today).await
        }

        BookingStep::ValidatingGarage => {
            if confirmation == ConfirmationSignal::Confirmed && session.garage.id.is_some() {
                session.garage.confirmed = true;
                session.advance();
                ensure_slots(state, session, today).await;
                return format!(
                    "C'est noté. Voici les prochains créneaux disponibles :\n{}\nQuel jour et quelle heure vous conviendraient ?",
                    list_slots(session)
                );
            }
            if let Some(id) = extract_garage(message) {
                if let Some(garage) = resolve_garage(session, id) {
                    set_garage(session, garage);
                    return garage_confirm_prompt(session);
                }
            }
            llm_turn(state, session, message, today).await
        }

        BookingStep::ChoosingSlot => {
            match apply_slot_input(session, message, today) {
                Some(reply) => reply,
                None => llm_turn(state, session, message, today).await,
            }
        }

        BookingStep::FinalConfirmation => {
            if confirmation == ConfirmationSignal::Confirmed {
                return finalize_booking(state, session).await;
            }
            // Inline corrections without a formal denial.
            if let Some(slug) = extract_service(message) {
                if let Some(op) = resolve_service(session, slug) {
                    set_service(session, op);
                    session.service.confirmed = true;
                    return final_confirm_prompt(session);
                }
            }
            if let Some(id) = extract_garage(message) {
                if let Some(garage) = resolve_garage(session, id) {
                    set_garage(session, garage);
                    session.garage.confirmed = true;
                    return final_confirm_prompt(session);
                }
            }
            if extract_date(message, today).is_some() || extract_time(message).is_some() {
                session.appointment.confirmed = false;
                if let Some(reply) = apply_slot_input(session, message, today) {
                    return reply;
                }
            }
            llm_turn(state, session, message, today).await
        }

        BookingStep::Completed => fallback_reply(BookingStep::Completed),
    }
}

/// Stores the plate and resolves the vehicle against the backend within the
/// same turn.
async fn accept_plate(
    state: &Arc<AppState>,
    session: &mut BookingSession,
    plate: String,
) -> String {
    session.vehicle = VehicleRecord {
        license_plate: Some(plate.clone()),
        ..VehicleRecord::default()
    };
    session.step = BookingStep::ValidatingVehicle;

    match state.backend.vehicle_by_plate(&plate).await {
        Ok(Some(vehicle)) => {
            session.vehicle.brand = Some(vehicle.brand.clone());
            session.vehicle.model = Some(vehicle.model.clone());
            session.vehicle.external_id = Some(vehicle.id);
            format!(
                "Votre {} {} (plaque {plate}) a été identifié. C'est bien votre véhicule ?",
                vehicle.brand, vehicle.model
            )
        }
        Ok(None) => {
            session.vehicle = VehicleRecord::default();
            session.step = BookingStep::AwaitingPlate;
            format!(
                "Je n'ai trouvé aucun véhicule pour la plaque {plate}. \
                 Pouvez-vous la vérifier et me la redonner ?"
            )
        }
        Err(e) => {
            tracing::warn!(error = %e, "vehicle lookup failed, continuing without vehicle data");
            format!("J'ai bien noté la plaque {plate}. C'est bien votre véhicule ?")
        }
    }
}

async fn handle_denial(state: &Arc<AppState>, session: &mut BookingSession) -> String {
    match session.step {
        BookingStep::ValidatingVehicle => {
            session.go_back_to(BookingStep::AwaitingPlate);
            "D'accord. Pouvez-vous me redonner votre plaque d'immatriculation ?".to_string()
        }
        BookingStep::ValidatingService => {
            session.go_back_to(BookingStep::ChoosingService);
            ensure_services(state, session).await;
            format!(
                "Pas de souci. Voici les services que nous proposons :\n{}\nLequel préférez-vous ?",
                list_services(session)
            )
        }
        BookingStep::ValidatingGarage => {
            session.go_back_to(BookingStep::ChoosingGarage);
            ensure_garages(state, session).await;
            format!(
                "Pas de souci. Voici nos garages :\n{}\nLequel préférez-vous ?",
                list_garages(session)
            )
        }
        BookingStep::FinalConfirmation => {
            session.appointment.confirmed = false;
            "D'accord, que souhaitez-vous modifier dans votre rendez-vous ?".to_string()
        }
        _ => fallback_reply(session.step),
    }
}

/// Date/time collection at the slot step. Returns `None` when the message
/// carries neither, so the caller can hand over to the model.
fn apply_slot_input(
    session: &mut BookingSession,
    message: &str,
    today: NaiveDate,
) -> Option<String> {
    let date = extract_date(message, today);
    let time = extract_time(message);
    if date.is_none() && time.is_none() {
        return None;
    }

    if let Some(d) = date {
        session.appointment.date = Some(d.format("%Y-%m-%d").to_string());
    }
    if let Some(t) = time {
        if !within_business_hours(t) {
            return Some(
                "Nos garages sont ouverts de 8h à 19h. Quel horaire dans cette plage vous conviendrait ?"
                    .to_string(),
            );
        }
        session.appointment.time = Some(t.format("%H:%M").to_string());
    }

    Some(
        match (
            session.appointment.date.clone(),
            session.appointment.time.clone(),
        ) {
            (Some(_), Some(_)) => {
                session.advance();
                final_confirm_prompt(session)
            }
            (Some(d), None) => {
                format!("C'est noté pour le {d}. À quelle heure souhaitez-vous venir ?")
            }
            (None, Some(t)) => format!("Très bien, à {t}. Quel jour vous conviendrait ?"),
            (None, None) => fallback_reply(BookingStep::ChoosingSlot),
        },
    )
}

fn within_business_hours(t: NaiveTime) -> bool {
    (BUSINESS_HOURS.0..BUSINESS_HOURS.1).contains(&t.hour())
}

/// Places the booking against the backend. On failure the session stays at
/// `FinalConfirmation` so a later "oui" retries.
async fn finalize_booking(state: &Arc<AppState>, session: &mut BookingSession) -> String {
    if !session.ready_for_booking() {
        return format!(
            "{}\nIl me manque encore des informations pour finaliser. Pouvez-vous compléter ?",
            session.summary()
        );
    }

    session.appointment.confirmed = true;

    let date = session.appointment.date.clone().unwrap_or_default();
    let time = session.appointment.time.clone().unwrap_or_default();
    let request = AppointmentRequest {
        date: format!("{date}T{time}:00"),
        vehicule_id: session
            .vehicle
            .external_id
            .clone()
            .or_else(|| session.vehicle.license_plate.clone())
            .unwrap_or_default(),
        garage_id: session.garage.id.clone().unwrap_or_default(),
        operations: session.service.id.clone().into_iter().collect(),
        notes: if session.sentiment.urgent {
            "Client pressé, merci de confirmer rapidement.".to_string()
        } else {
            "Réservation prise via l'assistant BOB.".to_string()
        },
        status: "pending".to_string(),
    };

    match state.backend.create_appointment(&request).await {
        Ok(created) => {
            session.appointment.created_id = Some(created.id);
            session.advance();

            let vehicle_text = match (&session.vehicle.brand, &session.vehicle.model) {
                (Some(brand), Some(model)) => format!("votre {brand} {model}"),
                _ => "votre véhicule".to_string(),
            };
            let plate = session.vehicle.license_plate.as_deref().unwrap_or("");
            let garage = session.garage.name.as_deref().unwrap_or("notre garage");
            let service = session.service.name.as_deref().unwrap_or("le service demandé");
            let price = session
                .service
                .price
                .map(|p| format!(" Le prix sera de {p}€."))
                .unwrap_or_default();

            format!(
                "Votre rendez-vous est confirmé pour {vehicle_text} (immatriculation {plate}) \
                 au garage {garage} le {date} à {time} pour {service}.{price} \
                 Merci de votre confiance !"
            )
        }
        Err(e) => {
            tracing::error!(error = %e, "appointment creation failed");
            session.appointment.confirmed = false;
            "Je suis désolé, nous n'avons pas pu enregistrer votre rendez-vous. \
             Pouvez-vous confirmer à nouveau dans un instant ?"
                .to_string()
        }
    }
}

/// No fast path fired: assemble the prompt, call the completion service under
/// its timeout and fold the normalized result back into the session.
async fn llm_turn(
    state: &Arc<AppState>,
    session: &mut BookingSession,
    message: &str,
    today: NaiveDate,
) -> String {
    let system = prompt::build_system_prompt(session);
    let mut messages: Vec<Message> = session
        .history
        .iter()
        .map(|h| Message {
            role: h.role.clone(),
            content: h.content.clone(),
        })
        .collect();
    messages.push(Message {
        role: "user".to_string(),
        content: message.to_string(),
    });

    let timeout = Duration::from_secs(state.config.completion_timeout_secs);
    let raw = match tokio::time::timeout(timeout, state.completion.complete(&system, &messages))
        .await
    {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => {
            tracing::warn!(error = %e, step = session.step.as_str(), "completion call failed");
            return fallback_reply(session.step);
        }
        Err(_) => {
            tracing::warn!(step = session.step.as_str(), "completion call timed out");
            return fallback_reply(session.step);
        }
    };

    let normalized = normalize(&raw);
    apply_normalized(state, session, normalized, today).await
}

/// Folds a normalized completion into the session. Extracted values only fill
/// the stage currently being collected, and the step only moves through
/// `advance()`, so a confused model can never skip an unconfirmed stage.
async fn apply_normalized(
    state: &Arc<AppState>,
    session: &mut BookingSession,
    normalized: NormalizedTurnResponse,
    today: NaiveDate,
) -> String {
    let extracted = &normalized.extracted;

    if session.step <= BookingStep::ValidatingVehicle {
        if let Some(plate) = &extracted.license_plate {
            // The model spotted a plate the fast path missed; the lookup
            // reply is more reliable than the model's own text.
            return accept_plate(state, session, plate.clone()).await;
        }
        if session.step == BookingStep::ValidatingVehicle
            && extracted.vehicle_validated
            && session.vehicle.license_plate.is_some()
        {
            session.vehicle.confirmed = true;
        }
    }

    if matches!(
        session.step,
        BookingStep::ChoosingService | BookingStep::ValidatingService
    ) {
        ensure_services(state, session).await;
        if let Some(op) = lookup_service(
            session,
            extracted.service_id.as_deref(),
            extracted.service_name.as_deref(),
        ) {
            set_service(session, op);
        }
        if extracted.service_validated && session.service.id.is_some() {
            session.service.confirmed = true;
        }
    }

    if matches!(
        session.step,
        BookingStep::ChoosingGarage | BookingStep::ValidatingGarage
    ) {
        ensure_garages(state, session).await;
        if let Some(garage) = lookup_garage(
            session,
            extracted.garage_id.as_deref(),
            extracted.garage_name.as_deref(),
        ) {
            set_garage(session, garage);
        }
        if extracted.garage_validated && session.garage.id.is_some() {
            session.garage.confirmed = true;
        }
    }

    if matches!(
        session.step,
        BookingStep::ChoosingSlot | BookingStep::FinalConfirmation
    ) {
        if let Some(date) = extracted
            .slot_date
            .as_deref()
            .and_then(|d| parse_slot_date(d, today))
        {
            session.appointment.date = Some(date.format("%Y-%m-%d").to_string());
        }
        if let Some(time) = extracted.slot_time.as_deref().and_then(parse_slot_time) {
            if within_business_hours(time) {
                session.appointment.time = Some(time.format("%H:%M").to_string());
            }
        }
    }

    if let Some(proposed) = normalized.proposed_step {
        if proposed != session.step {
            tracing::debug!(
                proposed = proposed.as_str(),
                actual = session.step.as_str(),
                "model proposed a different step"
            );
        }
    }

    // Monotonic progression, gated by whatever was applied above.
    while session.advance() {
        match session.step {
            BookingStep::ChoosingService => ensure_services(state, session).await,
            BookingStep::ChoosingGarage => ensure_garages(state, session).await,
            BookingStep::ChoosingSlot => ensure_slots(state, session, today).await,
            _ => {}
        }
    }

    if session.step == BookingStep::FinalConfirmation && extracted.final_confirmed {
        return finalize_booking(state, session).await;
    }

    normalized.message
}

// ── Catalog plumbing ──

async fn ensure_services(state: &Arc<AppState>, session: &mut BookingSession) {
    if !session.available_services.is_empty() {
        return;
    }
    session.available_services = match state.backend.operations(None).await {
        Ok(list) if !list.is_empty() => list,
        Ok(_) => catalog::fallback_services(),
        Err(e) => {
            tracing::warn!(error = %e, "operations fetch failed, using built-in catalog");
            catalog::fallback_services()
        }
    };
}

async fn ensure_garages(state: &Arc<AppState>, session: &mut BookingSession) {
    if !session.available_garages.is_empty() {
        return;
    }
    session.available_garages = match state.backend.garages().await {
        Ok(list) if !list.is_empty() => list,
        Ok(_) => catalog::fallback_garages(),
        Err(e) => {
            tracing::warn!(error = %e, "garage fetch failed, using built-in catalog");
            catalog::fallback_garages()
        }
    };
}

async fn ensure_slots(state: &Arc<AppState>, session: &mut BookingSession, today: NaiveDate) {
    if !session.available_slots.is_empty() {
        return;
    }
    let Some(garage_id) = session.garage.id.clone() else {
        return;
    };
    let from = (today + chrono::Duration::days(1))
        .format("%Y-%m-%d")
        .to_string();
    session.available_slots = match state.backend.availabilities(&garage_id, &from, 1).await {
        Ok(list) if !list.is_empty() => list,
        Ok(_) => catalog::fallback_slots(today, 3),
        Err(e) => {
            tracing::warn!(error = %e, "availabilities fetch failed, using built-in slots");
            catalog::fallback_slots(today, 3)
        }
    };
}

/// Keyword slug → catalog entry, preferring the backend's own data.
fn resolve_service(session: &BookingSession, slug: &str) -> Option<ServiceOperation> {
    let canonical = catalog::service_for_slug(slug)?;
    let found = session
        .available_services
        .iter()
        .find(|s| s.id == canonical.id || s.name.eq_ignore_ascii_case(&canonical.name));
    Some(found.cloned().unwrap_or(canonical))
}

fn resolve_garage(session: &BookingSession, id: &str) -> Option<Garage> {
    session
        .available_garages
        .iter()
        .find(|g| g.id == id)
        .cloned()
        .or_else(|| catalog::fallback_garages().into_iter().find(|g| g.id == id))
}

/// Model-extracted service id/name, accepted only when it resolves against
/// the catalog.
fn lookup_service(
    session: &BookingSession,
    id: Option<&str>,
    name: Option<&str>,
) -> Option<ServiceOperation> {
    session
        .available_services
        .iter()
        .find(|s| {
            id.is_some_and(|i| i == s.id) || name.is_some_and(|n| s.name.eq_ignore_ascii_case(n))
        })
        .cloned()
}

fn lookup_garage(session: &BookingSession, id: Option<&str>, name: Option<&str>) -> Option<Garage> {
    session
        .available_garages
        .iter()
        .find(|g| {
            id.is_some_and(|i| i == g.id) || name.is_some_and(|n| g.name.eq_ignore_ascii_case(n))
        })
        .cloned()
}

fn set_service(session: &mut BookingSession, op: ServiceOperation) {
    session.service = ServiceRecord {
        id: Some(op.id),
        name: Some(op.name),
        price: op.price,
        confirmed: false,
    };
}

fn set_garage(session: &mut BookingSession, garage: Garage) {
    session.garage.id = Some(garage.id);
    session.garage.name = Some(garage.name);
    session.garage.address = Some(garage.address);
    session.garage.confirmed = false;
}

fn parse_slot_date(raw: &str, today: NaiveDate) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%d/%m/%Y"))
        .ok()
        .or_else(|| extract_date(raw, today))
}

fn parse_slot_time(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M")
        .ok()
        .or_else(|| extract_time(raw))
}

// ── Presentation ──

fn list_services(session: &BookingSession) -> String {
    session
        .available_services
        .iter()
        .take(MAX_OPTIONS)
        .map(|s| match s.price {
            Some(price) => format!("- {} ({price}€)", s.name),
            None => format!("- {}", s.name),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn list_garages(session: &BookingSession) -> String {
    session
        .available_garages
        .iter()
        .take(MAX_OPTIONS)
        .map(|g| format!("- {} ({})", g.name, g.address))
        .collect::<Vec<_>>()
        .join("\n")
}

fn list_slots(session: &BookingSession) -> String {
    session
        .available_slots
        .iter()
        .take(MAX_OPTIONS)
        .map(|d| format!("- {} : {}", d.date, d.slots.join(", ")))
        .collect::<Vec<_>>()
        .join("\n")
}

fn service_confirm_prompt(session: &BookingSession) -> String {
    let name = session.service.name.as_deref().unwrap_or("ce service");
    match session.service.price {
        Some(price) => format!("Vous avez choisi {name} ({price}€). Confirmez-vous ce service ?"),
        None => format!("Vous avez choisi {name}. Confirmez-vous ce service ?"),
    }
}

fn garage_confirm_prompt(session: &BookingSession) -> String {
    let name = session.garage.name.as_deref().unwrap_or("ce garage");
    match &session.garage.address {
        Some(address) => format!("Vous avez choisi {name} ({address}). Confirmez-vous ce garage ?"),
        None => format!("Vous avez choisi {name}. Confirmez-vous ce garage ?"),
    }
}

fn final_confirm_prompt(session: &BookingSession) -> String {
    format!(
        "{}\nPouvez-vous confirmer ce rendez-vous ? Répondez par \"oui\" pour confirmer ou \"non\" pour modifier.",
        session.summary()
    )
}

/// Deterministic per-step replies used whenever the completion service is
/// unavailable or times out.
pub fn fallback_reply(step: BookingStep) -> String {
    match step {
        BookingStep::AwaitingIntent => {
            "Bonjour ! Je suis BOB, votre assistant de réservation auto. \
             Souhaitez-vous prendre un rendez-vous pour votre véhicule ?"
        }
        BookingStep::AwaitingPlate => {
            "Pouvez-vous me donner votre plaque d'immatriculation (format AA-123-BB) ?"
        }
        BookingStep::ValidatingVehicle => {
            "Pouvez-vous confirmer qu'il s'agit bien de votre véhicule ? Répondez par \"oui\" ou \"non\"."
        }
        BookingStep::ChoosingService => {
            "Quel service souhaitez-vous ? Nous proposons notamment la vidange, les pneus, \
             les freins, la climatisation et le contrôle technique."
        }
        BookingStep::ValidatingService => {
            "Pouvez-vous confirmer ce service ? Répondez par \"oui\" ou \"non\"."
        }
        BookingStep::ChoosingGarage => {
            "Dans quel garage souhaitez-vous venir ? Nous sommes notamment présents à Lyon, \
             Nice et Nantes."
        }
        BookingStep::ValidatingGarage => {
            "Pouvez-vous confirmer ce garage ? Répondez par \"oui\" ou \"non\"."
        }
        BookingStep::ChoosingSlot => {
            "Quel jour et quelle heure vous conviendraient ? Nos garages sont ouverts de 8h à 19h."
        }
        BookingStep::FinalConfirmation => {
            "Pouvez-vous confirmer ce rendez-vous ? Répondez par \"oui\" pour confirmer ou \"non\" pour modifier."
        }
        BookingStep::Completed => {
            "Votre rendez-vous est déjà confirmé. Envoyez une demande de réinitialisation pour \
             démarrer une nouvelle réservation."
        }
    }
    .to_string()
}

fn adapt_to_sentiment(reply: String, sentiment: Sentiment) -> String {
    let mut adapted = reply;
    if sentiment.frustrated && !adapted.contains("désol") && !adapted.contains("excuser") {
        adapted = format!("Je vous prie de m'excuser pour la gêne occasionnée. {adapted}");
    }
    if sentiment.urgent && !adapted.contains("rapidement") && !adapted.contains("au plus vite") {
        adapted.push_str(" Nous ferons au plus vite.");
    }
    if sentiment.positive && !adapted.to_lowercase().contains("merci") {
        adapted.push_str(" Merci pour votre confiance !");
    }
    adapted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_replies_cover_every_step() {
        for n in 1..=10 {
            let step = BookingStep::from_index(n).unwrap();
            assert!(!fallback_reply(step).is_empty());
        }
    }

    #[test]
    fn test_business_hours_window() {
        let t = |h, m| NaiveTime::from_hms_opt(h, m, 0).unwrap();
        assert!(within_business_hours(t(8, 0)));
        assert!(within_business_hours(t(18, 30)));
        assert!(!within_business_hours(t(19, 0)));
        assert!(!within_business_hours(t(7, 59)));
    }

    #[test]
    fn test_sentiment_adaptation() {
        let frustrated = Sentiment {
            frustrated: true,
            ..Sentiment::default()
        };
        let reply = adapt_to_sentiment("Quel service souhaitez-vous ?".to_string(), frustrated);
        assert!(reply.starts_with("Je vous prie de m'excuser"));

        let positive = Sentiment {
            positive: true,
            ..Sentiment::default()
        };
        let reply = adapt_to_sentiment("C'est noté.".to_string(), positive);
        assert!(reply.ends_with("Merci pour votre confiance !"));

        let neutral = Sentiment::default();
        let reply = adapt_to_sentiment("C'est noté.".to_string(), neutral);
        assert_eq!(reply, "C'est noté.");
    }

    #[test]
    fn test_slot_input_needs_both_parts() {
        let today = NaiveDate::from_ymd_opt(2026, 5, 1).unwrap();
        let mut session = BookingSession::new();
        session.step = BookingStep::ChoosingSlot;

        let reply = apply_slot_input(&mut session, "le 22/05", today).unwrap();
        assert!(reply.contains("quelle heure"));
        assert_eq!(session.step, BookingStep::ChoosingSlot);
        assert_eq!(session.appointment.date.as_deref(), Some("2026-05-22"));

        let reply = apply_slot_input(&mut session, "à 10h", today).unwrap();
        assert!(reply.contains("confirmer"));
        assert_eq!(session.step, BookingStep::FinalConfirmation);
        assert_eq!(session.appointment.time.as_deref(), Some("10:00"));
    }

    #[test]
    fn test_slot_input_rejects_after_hours() {
        let today = NaiveDate::from_ymd_opt(2026, 5, 1).unwrap();
        let mut session = BookingSession::new();
        session.step = BookingStep::ChoosingSlot;

        let reply = apply_slot_input(&mut session, "demain à 21h", today).unwrap();
        assert!(reply.contains("8h à 19h"));
        assert!(session.appointment.time.is_none());
        assert_eq!(session.step, BookingStep::ChoosingSlot);
    }

    #[test]
    fn test_slot_input_ignores_plain_text() {
        let today = NaiveDate::from_ymd_opt(2026, 5, 1).unwrap();
        let mut session = BookingSession::new();
        session.step = BookingStep::ChoosingSlot;
        assert!(apply_slot_input(&mut session, "je ne sais pas encore", today).is_none());
    }
}
