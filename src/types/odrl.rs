db_enum! {
    pub enum PolicyType as "policy type" {
        Permission => "permission",
        Prohibition => "prohibition",
        Obligation => "obligation",
    }
}

db_enum! {
    /// ODRL actions used for archival material.
    ///
    /// `use` is the parent of every other action.
    pub enum OdrlAction as "action" {
        Use => "use",
        Read => "read",
        Display => "display",
        Reproduce => "reproduce",
        Distribute => "distribute",
        Modify => "modify",
        Derive => "derive",
        Print => "print",
        Annotate => "annotate",
        Archive => "archive",
        Cite => "cite",
    }
}

impl OdrlAction {
    pub fn covers(&self, requested: OdrlAction) -> bool {
        *self == OdrlAction::Use || *self == requested
    }
}

db_enum! {
    pub enum LeftOperand as "left operand" {
        DateTime => "dateTime",
        Purpose => "purpose",
        Recipient => "recipient",
        Count => "count",
        Spatial => "spatial",
    }
}

db_enum! {
    pub enum ConstraintOperator as "operator" {
        Eq => "eq",
        Neq => "neq",
        Lt => "lt",
        Lteq => "lteq",
        Gt => "gt",
        Gteq => "gteq",
        IsAnyOf => "isAnyOf",
        IsNoneOf => "isNoneOf",
    }
}
