use serde::Serialize;

/// Raw text fields of a report submission, as they arrive in the multipart body.
#[derive(Debug, Default, Clone)]
pub struct ReportForm {
    pub user_id: Option<String>,
    pub report_date: Option<String>,
    pub plate: Option<String>,
    pub km_start: Option<String>,
    pub km_end: Option<String>,
    pub cost_fuel: Option<String>,
    pub cost_toll: Option<String>,
    pub cost_other: Option<String>,
    pub cost_description: Option<String>,
    pub collection_cash: Option<String>,
    pub collection_cc: Option<String>,
    pub collection_check: Option<String>,
    pub collection_eft: Option<String>,
    pub cash_delivered: Option<String>,
    pub notes: Option<String>,
}

impl ReportForm {
    /// Stores a named field. Returns `false` for names the form does not know.
    pub fn set(&mut self, name: &str, value: String) -> bool {
        let slot = match name {
            "user_id" => &mut self.user_id,
            "report_date" => &mut self.report_date,
            "plate" => &mut self.plate,
            "km_start" => &mut self.km_start,
            "km_end" => &mut self.km_end,
            "cost_fuel" => &mut self.cost_fuel,
            "cost_toll" => &mut self.cost_toll,
            "cost_other" => &mut self.cost_other,
            "cost_description" => &mut self.cost_description,
            "collection_cash" => &mut self.collection_cash,
            "collection_cc" => &mut self.collection_cc,
            "collection_check" => &mut self.collection_check,
            "collection_eft" => &mut self.collection_eft,
            "cash_delivered" => &mut self.cash_delivered,
            "notes" => &mut self.notes,
            _ => return false,
        };
        *slot = Some(value);
        true
    }
}

#[derive(Debug, Serialize)]
pub struct CreatedReportResponse {
    pub success: bool,
    #[serde(rename = "reportId")]
    pub report_id: i32,
    pub message: String,
}
