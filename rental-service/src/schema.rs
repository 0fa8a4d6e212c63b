diesel::table! {
    documents (doctype, name) {
        doctype -> Varchar,
        name -> Varchar,
        docstatus -> Int2,
        data -> Jsonb,
        created_at -> Nullable<Timestamptz>,
        modified_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    naming_series (prefix) {
        prefix -> Varchar,
        current -> Int4,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    documents,
    naming_series,
);
