/// Fresh random v4 UUID, the id format the backend uses for messages.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
