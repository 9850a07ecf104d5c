//! Barcode / QR request URLs for the external codec service.
//!
//! Nothing here fetches or decodes an image. The same payload always yields
//! the same URL so the service (and any cache in front of it) can reuse
//! results.

use reqwest::Url;

use crate::employee::{non_blank, EmployeeRecord};

/// QR error-correction level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCorrection {
    Low,
    Medium,
    Quartile,
    High,
}

impl ErrorCorrection {
    fn code(&self) -> &'static str {
        match self {
            ErrorCorrection::Low => "L",
            ErrorCorrection::Medium => "M",
            ErrorCorrection::Quartile => "Q",
            ErrorCorrection::High => "H",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CodecService {
    barcode_endpoint: Url,
    qr_endpoint: Url,
}

impl CodecService {
    /// `base_url` is the service root; `barcode` and `qr` endpoints hang off it.
    pub fn new(base_url: &str) -> Result<Self, String> {
        let mut base =
            Url::parse(base_url).map_err(|e| format!("invalid codec service URL {base_url:?}: {e}"))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let barcode_endpoint = base.join("barcode").map_err(|e| e.to_string())?;
        let qr_endpoint = base.join("qr").map_err(|e| e.to_string())?;
        Ok(Self {
            barcode_endpoint,
            qr_endpoint,
        })
    }

    /// Code-128 barcode rendered at `width` × `height` pixels.
    pub fn barcode_url(&self, payload: &str, width: u32, height: u32) -> String {
        let mut url = self.barcode_endpoint.clone();
        url.query_pairs_mut()
            .append_pair("data", payload)
            .append_pair("code", "Code128")
            .append_pair("width", &width.to_string())
            .append_pair("height", &height.to_string())
            .append_pair("format", "png");
        url.into()
    }

    /// Square QR code of `size` pixels.
    pub fn qr_url(&self, payload: &str, size: u32, ecc: ErrorCorrection) -> String {
        let mut url = self.qr_endpoint.clone();
        url.query_pairs_mut()
            .append_pair("data", payload)
            .append_pair("size", &format!("{size}x{size}"))
            .append_pair("ecc", ecc.code())
            .append_pair("format", "png");
        url.into()
    }
}

/// vCard 3.0 contact payload for the back-side QR code.
pub fn vcard(employee: &EmployeeRecord) -> String {
    let mut lines = vec![
        "BEGIN:VCARD".to_string(),
        "VERSION:3.0".to_string(),
        format!(
            "N:{};{};{};;{}",
            escape(employee.last_name.trim()),
            escape(employee.first_name.trim()),
            escape(non_blank(&employee.middle_name).unwrap_or("")),
            escape(non_blank(&employee.suffix).unwrap_or(""))
        ),
        format!("FN:{}", escape(&employee.full_name())),
    ];
    if !employee.position.trim().is_empty() {
        lines.push(format!("TITLE:{}", escape(employee.position.trim())));
    }
    if let Some(phone) = non_blank(&employee.phone) {
        lines.push(format!("TEL;TYPE=CELL:{}", escape(phone)));
    }
    if let Some(email) = non_blank(&employee.email) {
        lines.push(format!("EMAIL:{}", escape(email)));
    }
    lines.push("END:VCARD".to_string());
    lines.join("\r\n")
}

/// Public profile page used to verify a field officer's card.
pub fn profile_url(profile_base_url: &str, employee: &EmployeeRecord) -> String {
    format!(
        "{}/{}",
        profile_base_url.trim_end_matches('/'),
        employee.id_number.trim()
    )
}

fn escape(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace(';', "\\;")
        .replace(',', "\\,")
        .replace('\n', "\\n")
}
