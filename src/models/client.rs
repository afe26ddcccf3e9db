/// Billing contact owned by a single account. Deleting the owner cascades
/// to the client and every invoice that points at it.
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct Client {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub company: String,
    pub address1: String,
    pub address2: String,
    pub country: String,
    pub phone: Option<String>,
    pub created_by: i64,
}

impl Client {
    pub fn absolute_url(&self) -> String {
        format!("/clients/{}", self.id)
    }
}

impl std::fmt::Display for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.first_name, self.last_name)
    }
}
