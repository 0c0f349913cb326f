/// Every method the engine exposes, addressed on the wire by
/// `(service id, method id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    // i18n / progress service
    TranslateString,
    LatestProgress,
    SetWantsAbort,
    // collection service
    OpenCollection,
    CloseCollection,
    // database service
    RunDbCommand,
    RunDbCommandProto,
    RunDbCommandForRowCount,
    InsertForId,
    GetNextResultPage,
    FlushQuery,
    FlushAllQueries,
    SetPageSize,
    GetColumnNamesFromQuery,
}

impl Method {
    pub const ALL: [Method; 14] = [
        Method::TranslateString,
        Method::LatestProgress,
        Method::SetWantsAbort,
        Method::OpenCollection,
        Method::CloseCollection,
        Method::RunDbCommand,
        Method::RunDbCommandProto,
        Method::RunDbCommandForRowCount,
        Method::InsertForId,
        Method::GetNextResultPage,
        Method::FlushQuery,
        Method::FlushAllQueries,
        Method::SetPageSize,
        Method::GetColumnNamesFromQuery,
    ];

    /// `(service id, method id)`
    pub fn ids(self) -> (u32, u32) {
        match self {
            Method::TranslateString => (0, 0),
            Method::LatestProgress => (0, 1),
            Method::SetWantsAbort => (0, 2),
            Method::OpenCollection => (1, 0),
            Method::CloseCollection => (1, 1),
            Method::RunDbCommand => (2, 0),
            Method::RunDbCommandProto => (2, 1),
            Method::RunDbCommandForRowCount => (2, 2),
            Method::InsertForId => (2, 3),
            Method::GetNextResultPage => (2, 4),
            Method::FlushQuery => (2, 5),
            Method::FlushAllQueries => (2, 6),
            Method::SetPageSize => (2, 7),
            Method::GetColumnNamesFromQuery => (2, 8),
        }
    }

    pub fn from_ids(service: u32, method: u32) -> Option<Method> {
        Self::ALL.into_iter().find(|m| m.ids() == (service, method))
    }

    /// Exempt methods run without the backend mutex, so they stay callable
    /// while another thread holds a transaction.
    pub fn is_exempt(self) -> bool {
        matches!(
            self,
            Method::TranslateString
                | Method::LatestProgress
                | Method::SetWantsAbort
                | Method::FlushQuery
                | Method::FlushAllQueries
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            Method::TranslateString => "translate_string",
            Method::LatestProgress => "latest_progress",
            Method::SetWantsAbort => "set_wants_abort",
            Method::OpenCollection => "open_collection",
            Method::CloseCollection => "close_collection",
            Method::RunDbCommand => "run_db_command",
            Method::RunDbCommandProto => "run_db_command_proto",
            Method::RunDbCommandForRowCount => "run_db_command_for_row_count",
            Method::InsertForId => "insert_for_id",
            Method::GetNextResultPage => "get_next_result_page",
            Method::FlushQuery => "flush_query",
            Method::FlushAllQueries => "flush_all_queries",
            Method::SetPageSize => "set_page_size",
            Method::GetColumnNamesFromQuery => "get_column_names_from_query",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (service, method) = self.ids();
        write!(f, "{} ({}.{})", self.name(), service, method)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_ids_are_unique_and_reversible() {
        let mut seen = HashSet::new();
        for method in Method::ALL {
            assert!(seen.insert(method.ids()), "duplicate ids for {}", method);
            let (service, id) = method.ids();
            assert_eq!(Method::from_ids(service, id), Some(method));
        }
        assert_eq!(Method::from_ids(9, 9), None);
    }

    #[test]
    fn test_exempt_methods() {
        let exempt: Vec<_> = Method::ALL.into_iter().filter(|m| m.is_exempt()).collect();
        assert_eq!(exempt.len(), 5);
        assert!(Method::FlushQuery.is_exempt());
        assert!(!Method::GetNextResultPage.is_exempt());
        assert!(!Method::RunDbCommand.is_exempt());
    }
}
