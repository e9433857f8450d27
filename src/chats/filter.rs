use std::collections::HashMap;

use sqlx::{QueryBuilder, Sqlite};

/// A column a client may filter or order by. Substring (`-like`) matching is
/// only offered for textual columns.
#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub name: &'static str,
    pub textual: bool,
}

pub const MESSAGE_COLUMNS: &[Column] = &[
    Column { name: "message_id", textual: false },
    Column { name: "chat_id", textual: false },
    Column { name: "sender_id", textual: false },
    Column { name: "receiver_id", textual: false },
    Column { name: "text", textual: true },
    Column { name: "datetime_writing", textual: false },
];

pub const USER_COLUMNS: &[Column] = &[
    Column { name: "user_id", textual: false },
    Column { name: "username", textual: true },
    Column { name: "name", textual: true },
    Column { name: "date_joined", textual: false },
];

fn find(columns: &[Column], name: &str) -> Option<Column> {
    columns.iter().copied().find(|column| column.name == name)
}

/// Applies the generic listing parameters to a query that already carries its
/// own WHERE clause: exact `field=value`, substring `field-like=value`,
/// `ordered-by` / `ordered-by-desc`, `limit` and `offset`. Parameters that do
/// not name a whitelisted column are ignored; values are always bound, never
/// spliced. `default_order` is used when no valid ordering was requested.
pub fn apply<'a>(
    builder: &mut QueryBuilder<'a, Sqlite>,
    columns: &[Column],
    args: &'a HashMap<String, String>,
    default_order: &str,
) {
    for (key, value) in args {
        if let Some(name) = key.strip_suffix("-like") {
            if let Some(column) = find(columns, name) {
                if column.textual {
                    builder.push(format!(" AND {} LIKE ", column.name));
                    builder.push_bind(format!("%{value}%"));
                }
            }
        } else if let Some(column) = find(columns, key) {
            builder.push(format!(" AND {} = ", column.name));
            builder.push_bind(value.as_str());
        }
    }

    let mut ordered = false;
    if let Some(value) = args.get("ordered-by") {
        if let Some(column) = find(columns, value) {
            builder.push(format!(" ORDER BY {}", column.name));
            ordered = true;
        }
    }
    if !ordered {
        if let Some(value) = args.get("ordered-by-desc") {
            if let Some(column) = find(columns, value) {
                builder.push(format!(" ORDER BY {} DESC", column.name));
                ordered = true;
            }
        }
    }
    if !ordered {
        builder.push(format!(" {default_order}"));
    }

    let limit = args.get("limit").and_then(|value| value.parse::<i64>().ok());
    let offset = args.get("offset").and_then(|value| value.parse::<i64>().ok());
    match (limit, offset) {
        (Some(limit), Some(offset)) => {
            builder.push(" LIMIT ");
            builder.push_bind(limit);
            builder.push(" OFFSET ");
            builder.push_bind(offset);
        }
        (Some(limit), None) => {
            builder.push(" LIMIT ");
            builder.push_bind(limit);
        }
        (None, Some(offset)) => {
            // sqlite cannot OFFSET without a LIMIT
            builder.push(" LIMIT -1 OFFSET ");
            builder.push_bind(offset);
        }
        (None, None) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chats::identity::ChatDirectory;
    use crate::chats::store::{self, NewMessage};
    use crate::db::test_pool;
    use chrono::DateTime;
    use sqlx::SqlitePool;

    async fn seed(pool: &SqlitePool) {
        for i in 1..=2 {
            sqlx::query(
                "INSERT INTO users (username, email, name, password_hash, date_joined)
                 VALUES (?, ?, ?, 'x', datetime('now'))",
            )
            .bind(format!("user{i}"))
            .bind(format!("user{i}@example.com"))
            .bind(format!("name{i}"))
            .execute(pool)
            .await
            .unwrap();
        }
        let chats = ChatDirectory::new();
        let texts = ["alpha", "beta", "gamma", "alphabet"];
        for (i, text) in texts.iter().enumerate() {
            store::create_message(
                pool,
                &chats,
                NewMessage {
                    text,
                    sender_id: if i % 2 == 0 { 1 } else { 2 },
                    receiver_id: if i % 2 == 0 { 2 } else { 1 },
                    chat_id: None,
                    datetime_writing: Some(
                        DateTime::from_timestamp(1_700_000_000 + i as i64, 0)
                            .unwrap()
                            .naive_utc(),
                    ),
                },
            )
            .await
            .unwrap();
        }
    }

    fn args(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    async fn run(pool: &SqlitePool, args: &HashMap<String, String>) -> Vec<String> {
        let mut builder: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new("SELECT text FROM messages WHERE chat_id = ");
        builder.push_bind(1i64);
        apply(&mut builder, MESSAGE_COLUMNS, args, "ORDER BY message_id");
        builder
            .build_query_scalar::<String>()
            .fetch_all(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn exact_match_filters() {
        let pool = test_pool().await;
        seed(&pool).await;
        assert_eq!(run(&pool, &args(&[("text", "beta")])).await, vec!["beta"]);
        assert_eq!(run(&pool, &args(&[("sender_id", "1")])).await, vec![
            "alpha", "gamma"
        ]);
    }

    #[tokio::test]
    async fn like_matches_substrings_on_text_columns_only() {
        let pool = test_pool().await;
        seed(&pool).await;
        assert_eq!(run(&pool, &args(&[("text-like", "alpha")])).await, vec![
            "alpha",
            "alphabet"
        ]);
        // -like against a non-textual column is ignored
        assert_eq!(run(&pool, &args(&[("sender_id-like", "1")])).await.len(), 4);
    }

    #[tokio::test]
    async fn ordering_and_window() {
        let pool = test_pool().await;
        seed(&pool).await;
        assert_eq!(
            run(&pool, &args(&[("ordered-by-desc", "message_id")])).await,
            vec!["alphabet", "gamma", "beta", "alpha"]
        );
        assert_eq!(
            run(&pool, &args(&[("limit", "2"), ("offset", "1")])).await,
            vec!["beta", "gamma"]
        );
        assert_eq!(run(&pool, &args(&[("offset", "3")])).await, vec!["alphabet"]);
    }

    #[tokio::test]
    async fn unknown_parameters_are_ignored() {
        let pool = test_pool().await;
        seed(&pool).await;
        let all = run(
            &pool,
            &args(&[("bogus", "1"), ("ordered-by", "nope"), ("limit", "x")]),
        )
        .await;
        assert_eq!(all, vec!["alpha", "beta", "gamma", "alphabet"]);
    }
}
