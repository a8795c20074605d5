// Battery domain model

#[derive(Debug, Clone, PartialEq)]
pub struct Battery {
    pub imei: String,
    pub name: String,
}

impl Battery {
    pub fn new(imei: String) -> Self {
        let name = Self::format_name(&imei);
        Self { imei, name }
    }

    fn format_name(imei: &str) -> String {
        // "865044073967657" -> "Battery …7657"
        let digits = imei.trim();
        let tail_start = digits
            .char_indices()
            .rev()
            .nth(3)
            .map(|(idx, _)| idx)
            .unwrap_or(0);
        if tail_start == 0 {
            format!("Battery {}", digits)
        } else {
            format!("Battery …{}", &digits[tail_start..])
        }
    }
}
