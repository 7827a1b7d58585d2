//! Event-ticketing schema for Turnstile.
//!
//! Declares the four lists of the ticketing backend - Admin, Event, Ticket,
//! and User - with their fields, constraints, relation pairs, and access
//! policies. Apply the bundle returned by [`lists`] to a
//! [`Database`](turnstile_core::Database) and the core enforces everything
//! declared here.

use chrono::NaiveDate;
use turnstile_core::{
    AccessPolicy, DefaultValue, FieldDef, ListDef, RelationDef, SchemaBundle,
};

/// Default date assigned to events created without one.
pub fn default_event_date() -> NaiveDate {
    // from_ymd_opt only fails on out-of-range input.
    NaiveDate::from_ymd_opt(2023, 1, 1).unwrap_or_default()
}

/// The complete ticketing schema bundle.
pub fn lists() -> SchemaBundle {
    SchemaBundle::new()
        .with_list(admin())
        .with_list(event())
        .with_list(ticket())
        .with_list(user())
        .with_relation(ticket_owner())
        .with_relation(ticket_event())
}

/// Back-office operators.
///
/// WARNING: like every list here, Admin allows anyone to create, query,
/// update, and delete anything. Scope the policies per operation before
/// exposing this schema to untrusted callers.
fn admin() -> ListDef {
    ListDef::new("Admin")
        .with_field(FieldDef::text("name").required())
        // No two admins may share an email address.
        .with_field(FieldDef::text("email").required().unique())
        // Stored as an argon2 hash, never as plaintext.
        .with_field(FieldDef::password("password").required())
        .with_field(FieldDef::timestamp("createdAt").with_default(DefaultValue::Now))
        .with_access(AccessPolicy::allow_all())
}

fn event() -> ListDef {
    ListDef::new("Event")
        .with_field(FieldDef::text("name").unique())
        .with_field(FieldDef::text("description"))
        .with_field(FieldDef::text("venue"))
        .with_field(
            FieldDef::calendar_day("date")
                .required()
                .with_default(DefaultValue::CalendarDay(default_event_date()))
                // The storage column keeps its legacy name.
                .with_db_column("my_date"),
        )
        .with_access(AccessPolicy::allow_all())
}

/// A ticket connects one user to one event. Both sides are optional; the
/// relation fields come from [`ticket_owner`] and [`ticket_event`].
fn ticket() -> ListDef {
    ListDef::new("Ticket").with_access(AccessPolicy::allow_all())
}

fn user() -> ListDef {
    ListDef::new("User")
        .with_field(FieldDef::text("name"))
        .with_field(FieldDef::text("telegramUsername"))
        .with_field(FieldDef::text("telegramId").unique())
        // Misspelling kept for compatibility with existing clients.
        .with_field(FieldDef::text("submitedName"))
        .with_field(FieldDef::text("email"))
        .with_access(AccessPolicy::allow_all())
}

/// Ticket.owner -> User, with the derived to-many User.ticket.
fn ticket_owner() -> RelationDef {
    RelationDef::many_to_one("ticket_owner", "Ticket", "owner", "User", "ticket")
        .with_cards_ui(["telegramId"], ["name"])
}

/// Ticket.event -> Event, with the derived to-many Event.ticket.
fn ticket_event() -> RelationDef {
    RelationDef::many_to_one("ticket_event", "Ticket", "event", "Event", "ticket")
        .with_cards_ui(["name"], ["name"])
}
