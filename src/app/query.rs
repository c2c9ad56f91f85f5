use sqlx::{Postgres, QueryBuilder};

/// Wraps a user-supplied term into an `ILIKE` substring pattern.
pub fn like_pattern(term: &str) -> String {
    format!("%{}%", escape_like_pattern(term))
}

fn escape_like_pattern(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '%' | '_' | '\\' => {
                escaped.push('\\');
                escaped.push(ch);
            }
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Appends `AND (<col> ILIKE $n ESCAPE '\' OR ...)` over the given columns.
pub fn push_text_search(builder: &mut QueryBuilder<'_, Postgres>, columns: &[&str], term: &str) {
    let pattern = like_pattern(term);
    builder.push(" AND (");
    for (index, column) in columns.iter().enumerate() {
        if index > 0 {
            builder.push(" OR ");
        }
        builder
            .push(*column)
            .push(" ILIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\'");
    }
    builder.push(")");
}

/// Appends `LIMIT $n OFFSET $m`.
pub fn push_page(builder: &mut QueryBuilder<'_, Postgres>, limit: i64, offset: i64) {
    builder
        .push(" LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);
}
