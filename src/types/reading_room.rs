db_enum! {
    pub enum BookingStatus as "booking status" {
        Pending => "pending",
        Confirmed => "confirmed",
        Cancelled => "cancelled",
        Completed => "completed",
        NoShow => "no_show",
    }
}

db_enum! {
    pub enum MaterialRequestStatus as "material request status" {
        Requested => "requested",
        Retrieved => "retrieved",
        Delivered => "delivered",
        Returned => "returned",
    }
}

db_enum! {
    pub enum SeatType as "seat type" {
        Standard => "standard",
        Accessible => "accessible",
        Computer => "computer",
        Microfilm => "microfilm",
        Oversize => "oversize",
        Quiet => "quiet",
        Group => "group",
    }
}

impl Default for SeatType {
    fn default() -> Self {
        SeatType::Standard
    }
}

db_enum! {
    pub enum AssignmentStatus as "assignment status" {
        Assigned => "assigned",
        Occupied => "occupied",
        Released => "released",
    }
}

db_enum! {
    pub enum EquipmentType as "equipment type" {
        MicrofilmReader => "microfilm_reader",
        Scanner => "scanner",
        Camera => "camera",
        Computer => "computer",
        Magnifier => "magnifier",
        LightBox => "light_box",
        Other => "other",
    }
}

db_enum! {
    pub enum EquipmentCondition as "equipment condition" {
        Excellent => "excellent",
        Good => "good",
        Fair => "fair",
        NeedsRepair => "needs_repair",
        OutOfService => "out_of_service",
    }
}

impl Default for EquipmentCondition {
    fn default() -> Self {
        EquipmentCondition::Good
    }
}

db_enum! {
    /// Condition reported by staff when equipment comes back.
    pub enum ReturnCondition as "return condition" {
        Excellent => "excellent",
        Good => "good",
        Fair => "fair",
        Damaged => "damaged",
    }
}

db_enum! {
    pub enum EquipmentBookingStatus as "equipment booking status" {
        Reserved => "reserved",
        InUse => "in_use",
        Returned => "returned",
        Cancelled => "cancelled",
        NoShow => "no_show",
    }
}

db_enum! {
    pub enum RequestPriority as "request priority" {
        Low => "low",
        Normal => "normal",
        High => "high",
        Urgent => "urgent",
    }
}

impl Default for RequestPriority {
    fn default() -> Self {
        RequestPriority::Normal
    }
}

impl RequestPriority {
    /// Ordering weight; higher is retrieved first.
    pub fn rank(&self) -> i64 {
        match self {
            RequestPriority::Low => 0,
            RequestPriority::Normal => 1,
            RequestPriority::High => 2,
            RequestPriority::Urgent => 3,
        }
    }
}

db_enum! {
    /// Material request column a retrieval queue sorts on.
    pub enum QueueSortField as "queue sort field" {
        CreatedAt => "created_at",
        Priority => "priority",
        BookingDate => "booking_date",
        RetrievedAt => "retrieved_at",
        UpdatedAt => "updated_at",
    }
}

impl Default for QueueSortField {
    fn default() -> Self {
        QueueSortField::CreatedAt
    }
}

db_enum! {
    pub enum SortDirection as "sort direction" {
        Asc => "asc",
        Desc => "desc",
    }
}

impl Default for SortDirection {
    fn default() -> Self {
        SortDirection::Asc
    }
}
