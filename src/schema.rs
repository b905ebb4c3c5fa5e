// Diesel table definitions. Kept in sync with `DbContext::init_schema`.

diesel::table! {
    documents (id) {
        id -> Text,
        filename -> Text,
        original_name -> Text,
        file_type -> Text,
        file_size -> BigInt,
        upload_date -> Text,
        text_content -> Nullable<Text>,
        analysis_result -> Nullable<Text>,
        status -> Text,
        updated_at -> Text,
    }
}
