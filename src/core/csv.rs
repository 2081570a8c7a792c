// CSV export for the admin dashboard

use crate::core::models::Registration;

/// Byte-order mark so Excel opens the export as UTF-8.
const UTF8_BOM: &str = "\u{feff}";

/// Fixed column set of the export, in order.
const CSV_HEADERS: [&str; 11] = [
    "id",
    "name",
    "phone",
    "age",
    "church",
    "city",
    "wantsShirt",
    "shirtSize",
    "paymentStatus",
    "receiptUrl",
    "createdAt",
];

/// Quote a field when it contains a comma, quote, or newline; inner
/// quotes are doubled (RFC 4180).
pub fn escape_csv_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Render the full export: BOM, header row, one row per registration.
pub fn export_csv(registrations: &[Registration]) -> String {
    let mut rows = Vec::with_capacity(registrations.len() + 1);
    rows.push(CSV_HEADERS.join(","));

    for reg in registrations {
        let fields = [
            escape_csv_field(&reg.id),
            escape_csv_field(&reg.name),
            escape_csv_field(&reg.phone),
            escape_csv_field(reg.age.as_deref().unwrap_or_default()),
            escape_csv_field(reg.church.as_deref().unwrap_or_default()),
            escape_csv_field(reg.city.as_deref().unwrap_or_default()),
            escape_csv_field(&reg.wants_shirt),
            escape_csv_field(reg.shirt_size.map(|s| s.as_str()).unwrap_or_default()),
            escape_csv_field(reg.payment_status.as_str()),
            escape_csv_field(reg.receipt_url.as_deref().unwrap_or_default()),
            escape_csv_field(&reg.created_at),
        ];
        rows.push(fields.join(","));
    }

    format!("{}{}", UTF8_BOM, rows.join("\n"))
}
