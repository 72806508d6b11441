db_enum! {
    pub enum ResearcherStatus as "researcher status" {
        Pending => "pending",
        Approved => "approved",
        Suspended => "suspended",
    }
}

db_enum! {
    pub enum ProjectStatus as "project status" {
        Active => "active",
        Completed => "completed",
        Archived => "archived",
    }
}

db_enum! {
    pub enum CollaboratorStatus as "collaborator status" {
        Pending => "pending",
        Accepted => "accepted",
    }
}
