diesel::table! {
    support_tickets (id) {
        id -> Uuid,
        ticket_number -> Varchar,
        subject -> Varchar,
        description -> Nullable<Text>,
        solution_id -> Uuid,
        status -> Varchar,
        priority -> Varchar,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
        first_response_at -> Nullable<Timestamptz>,
        resolved_at -> Nullable<Timestamptz>,
        closed_at -> Nullable<Timestamptz>,
        sla_response_due -> Nullable<Timestamptz>,
        sla_resolution_due -> Nullable<Timestamptz>,
        sla_consumption_pct -> Float8,
        sla_status -> Varchar,
        escalation_level -> Int4,
        sla_paused_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    ticket_hold_intervals (id) {
        id -> Uuid,
        ticket_id -> Uuid,
        paused_at -> Timestamptz,
        resumed_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    ticket_sla_policies (id) {
        id -> Uuid,
        solution_id -> Uuid,
        priority -> Varchar,
        response_hours -> Int4,
        resolution_hours -> Int4,
        is_active -> Bool,
    }
}

diesel::table! {
    ticket_escalation_configs (id) {
        id -> Uuid,
        solution_id -> Uuid,
        level -> Int4,
        threshold_percent -> Float8,
    }
}

diesel::table! {
    ticket_escalation_alerts (id) {
        id -> Uuid,
        ticket_id -> Uuid,
        alert_level -> Int4,
        consumption_pct -> Float8,
        acknowledged -> Bool,
        created_at -> Timestamptz,
    }
}

diesel::joinable!(ticket_hold_intervals -> support_tickets (ticket_id));
diesel::joinable!(ticket_escalation_alerts -> support_tickets (ticket_id));

diesel::allow_tables_to_appear_in_same_query!(
    support_tickets,
    ticket_hold_intervals,
    ticket_sla_policies,
    ticket_escalation_configs,
    ticket_escalation_alerts,
);
