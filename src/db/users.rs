use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::models::User;

pub struct NewUser<'a> {
    pub username: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub email: &'a str,
    pub password_hash: Option<&'a str>,
}

const USER_COLUMNS: &str =
    "id, username, first_name, last_name, email, password_hash, created_at";

fn from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        email: row.get(4)?,
        password_hash: row.get(5)?,
        created_at: row.get(6)?,
    })
}

/// Insert a user and return its id. Fails on a duplicate username.
pub fn create(conn: &Connection, user: &NewUser<'_>) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO users (username, first_name, last_name, email, password_hash)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            user.username,
            user.first_name,
            user.last_name,
            user.email,
            user.password_hash
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn find_by_username(conn: &Connection, username: &str) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
        params![username],
        from_row,
    )
    .optional()
}

pub fn find_by_id(conn: &Connection, id: i64) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
        params![id],
        from_row,
    )
    .optional()
}

pub fn username_taken(conn: &Connection, username: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM users WHERE username = ?1",
        params![username],
        |row| row.get(0),
    )
}

pub fn set_password_hash(conn: &Connection, id: i64, hash: &str) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE users SET password_hash = ?1 WHERE id = ?2",
        params![hash, id],
    )?;
    Ok(())
}

/// Users registered with `email`, compared case-insensitively. Blank
/// addresses never match.
pub fn find_by_email(conn: &Connection, email: &str) -> rusqlite::Result<Vec<User>> {
    let email = email.trim();
    if email.is_empty() {
        return Ok(Vec::new());
    }
    let mut stmt = conn.prepare(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE email = ?1 COLLATE NOCASE ORDER BY id"
    ))?;
    let users = stmt
        .query_map(params![email], from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(users)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::test_pool;

    #[test]
    fn create_and_find_user() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let id = create(
            &conn,
            &NewUser {
                username: "leo",
                first_name: "Leo",
                last_name: "Tolstoy",
                email: "leo@example.com",
                password_hash: Some("hash"),
            },
        )
        .unwrap();

        let user = find_by_username(&conn, "leo").unwrap().unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.display_name(), "Leo Tolstoy");
        assert_eq!(user.password_hash.as_deref(), Some("hash"));
        assert_eq!(find_by_id(&conn, id).unwrap().unwrap().username, "leo");
        assert!(find_by_username(&conn, "nobody").unwrap().is_none());
    }

    #[test]
    fn duplicate_username_rejected() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let user = NewUser {
            username: "dup",
            first_name: "",
            last_name: "",
            email: "",
            password_hash: None,
        };
        create(&conn, &user).unwrap();
        let err = create(&conn, &user).unwrap_err();
        assert!(crate::db::is_unique_violation(&err));
        assert!(username_taken(&conn, "dup").unwrap());
    }

    #[test]
    fn find_by_email_ignores_case_and_blanks() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let id = create(
            &conn,
            &NewUser {
                username: "leo",
                first_name: "",
                last_name: "",
                email: "Leo@Example.com",
                password_hash: None,
            },
        )
        .unwrap();
        crate::db::testing::user(&conn, "anon");

        let found = find_by_email(&conn, "leo@example.com").unwrap();
        assert_eq!(found.iter().map(|u| u.id).collect::<Vec<_>>(), vec![id]);
        assert!(find_by_email(&conn, "").unwrap().is_empty());
        assert!(find_by_email(&conn, "ghost@example.com").unwrap().is_empty());
    }

    #[test]
    fn display_name_falls_back_to_username() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let id = crate::db::testing::user(&conn, "anon");
        let user = find_by_id(&conn, id).unwrap().unwrap();
        assert_eq!(user.display_name(), "anon");
    }

    #[test]
    fn set_password_hash_updates_row() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let id = crate::db::testing::user(&conn, "pw");
        set_password_hash(&conn, id, "new-hash").unwrap();
        let user = find_by_id(&conn, id).unwrap().unwrap();
        assert_eq!(user.password_hash.as_deref(), Some("new-hash"));
    }
}
