db_enum! {
    pub enum ReproductionStatus as "reproduction status" {
        Draft => "draft",
        Submitted => "submitted",
        Processing => "processing",
        AwaitingPayment => "awaiting_payment",
        InProduction => "in_production",
        Completed => "completed",
        Cancelled => "cancelled",
    }
}

impl ReproductionStatus {
    /// No further transitions leave these states.
    pub fn is_final(&self) -> bool {
        matches!(self, ReproductionStatus::Completed | ReproductionStatus::Cancelled)
    }
}

db_enum! {
    pub enum ReproductionType as "reproduction type" {
        Photocopy => "photocopy",
        Scan => "scan",
        Photograph => "photograph",
        DigitalCopy => "digital_copy",
        Transcription => "transcription",
        Certification => "certification",
    }
}

impl Default for ReproductionType {
    fn default() -> Self {
        ReproductionType::Scan
    }
}

db_enum! {
    pub enum ColorMode as "color mode" {
        Grayscale => "grayscale",
        Color => "color",
        Bitonal => "bitonal",
    }
}

impl Default for ColorMode {
    fn default() -> Self {
        ColorMode::Grayscale
    }
}

db_enum! {
    pub enum ReproductionItemStatus as "reproduction item status" {
        Pending => "pending",
        InProgress => "in_progress",
        Completed => "completed",
        Cancelled => "cancelled",
    }
}
