// Diesel table definitions for the transcription ledger.
// Kept in sync by hand with repository/schema_sqlite.sql.

diesel::table! {
    transcription_input (id) {
        id -> Integer,
        document_type -> Text,
        input_file -> Text,
        created_at -> Text,
    }
}

diesel::table! {
    transcription_output (id) {
        id -> Integer,
        input_id -> Integer,
        page -> Integer,
        block -> Integer,
        status -> Text,
        ocr_output_file -> Nullable<Text>,
        ocr_confidence -> Nullable<Double>,
        list_replacement_output_file -> Nullable<Text>,
        pii_scrubber_output_file -> Nullable<Text>,
        pii_scrubber_confidence_file -> Nullable<Text>,
        created_at -> Text,
    }
}

diesel::table! {
    transcription_metadata (id) {
        id -> Integer,
        input_id -> Integer,
        subject_id -> Nullable<Text>,
        year_in_study -> Nullable<Integer>,
        visit_date -> Nullable<Text>,
    }
}

diesel::joinable!(transcription_output -> transcription_input (input_id));
diesel::joinable!(transcription_metadata -> transcription_input (input_id));

diesel::allow_tables_to_appear_in_same_query!(
    transcription_input,
    transcription_output,
    transcription_metadata,
);
