//! Query filters for loading the catalog view.

use clap::ValueEnum;

/// How several tags or path terms are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Combinator {
    /// At least one must match.
    #[default]
    Any,
    /// Every one must match.
    All,
}

impl Combinator {
    fn sql_joiner(&self) -> &'static str {
        match self {
            Combinator::Any => " OR ",
            Combinator::All => " AND ",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SortKey {
    #[default]
    MediaId,
    MountAlias,
    RelativePath,
    ModifiedTime,
    TimesPlayed,
}

impl SortKey {
    fn column(&self) -> &'static str {
        match self {
            SortKey::MediaId => "media_id",
            SortKey::MountAlias => "mount_alias",
            SortKey::RelativePath => "relative_path",
            SortKey::ModifiedTime => "modified_time",
            SortKey::TimesPlayed => "times_played",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SortOrder {
    pub key: SortKey,
    pub descending: bool,
}

/// Narrows `CatalogStore::load`. Tag and path conditions are AND-ed together;
/// an empty filter matches everything.
#[derive(Debug, Clone, Default)]
pub struct CatalogFilter {
    pub tags: Vec<String>,
    pub tag_combinator: Combinator,
    pub path_terms: Vec<String>,
    pub path_combinator: Combinator,
    pub sort: SortOrder,
}

impl CatalogFilter {
    pub fn with_tags<I, S>(mut self, tags: I, combinator: Combinator) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self.tag_combinator = combinator;
        self
    }

    pub fn with_path_terms<I, S>(mut self, terms: I, combinator: Combinator) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.path_terms = terms.into_iter().map(Into::into).collect();
        self.path_combinator = combinator;
        self
    }

    pub fn sorted_by(mut self, key: SortKey, descending: bool) -> Self {
        self.sort = SortOrder { key, descending };
        self
    }

    /// Builds the SELECT statement and its positional parameters.
    pub(crate) fn to_sql(&self) -> (String, Vec<String>) {
        let mut sql = String::from(
            "SELECT media_id, mount_alias, relative_path, modified_time, times_played FROM media",
        );
        let mut conditions: Vec<String> = Vec::new();
        let mut params: Vec<String> = Vec::new();

        let mut tags: Vec<&str> = self
            .tags
            .iter()
            .map(|tag| tag.trim())
            .filter(|tag| !tag.is_empty())
            .collect();
        tags.sort_unstable();
        tags.dedup();

        if !tags.is_empty() {
            let placeholders = vec!["?"; tags.len()].join(", ");
            let mut condition = format!(
                "media_id IN (SELECT mt.media_id FROM media_tag mt JOIN tag t ON t.tag_id = mt.tag_id WHERE t.name IN ({})",
                placeholders
            );
            if self.tag_combinator == Combinator::All {
                condition.push_str(&format!(
                    " GROUP BY mt.media_id HAVING COUNT(DISTINCT t.tag_id) = {}",
                    tags.len()
                ));
            }
            condition.push(')');
            conditions.push(condition);
            params.extend(tags.iter().map(|tag| tag.to_string()));
        }

        if !self.path_terms.is_empty() {
            let term_conditions =
                vec!["relative_path LIKE ? ESCAPE '\\'"; self.path_terms.len()]
                    .join(self.path_combinator.sql_joiner());
            conditions.push(format!("({})", term_conditions));
            params.extend(
                self.path_terms
                    .iter()
                    .map(|term| format!("%{}%", escape_like(term))),
            );
        }

        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }

        sql.push_str(&format!(
            " ORDER BY {} {}",
            self.sort.key.column(),
            if self.sort.descending { "DESC" } else { "ASC" }
        ));
        if self.sort.key != SortKey::MediaId {
            sql.push_str(", media_id ASC");
        }
        (sql, params)
    }
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
