// Battery service - Use case for listing the batteries a session may open
use crate::domain::battery::Battery;

#[derive(Debug, Clone)]
pub struct BatteryService {
    authorized_imeis: Vec<String>,
}

impl BatteryService {
    pub fn new(authorized_imeis: Vec<String>) -> Self {
        Self { authorized_imeis }
    }

    pub fn list_batteries(&self) -> Vec<Battery> {
        self.authorized_imeis
            .iter()
            .cloned()
            .map(Battery::new)
            .collect()
    }

    pub fn is_authorized(&self, imei: &str) -> bool {
        self.authorized_imeis.iter().any(|known| known == imei)
    }
}
