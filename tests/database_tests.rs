#![allow(clippy::unwrap_used)]

mod common;

use anyhow::Result;
use chrono::{Duration, TimeZone, Utc};
use common::{setup_test_db, test_now, ALICE_ID, BOB_ID};
use feeding_tracker_bot::database::models::*;

fn utc(dt: chrono::DateTime<Utc>) -> chrono::DateTime<chrono_tz::Tz> {
    dt.with_timezone(&chrono_tz::UTC)
}

#[tokio::test]
async fn test_user_get_or_create_is_idempotent() -> Result<()> {
    let (db, _temp_dir) = setup_test_db().await;

    assert!(User::find_by_username(&db.pool, "alice").await?.is_none());

    let created = User::get_or_create(&db.pool, "alice", ALICE_ID).await?;
    assert_eq!(created.id, ALICE_ID);
    assert_eq!(created.username, "alice");

    let again = User::get_or_create(&db.pool, "alice", ALICE_ID).await?;
    assert_eq!(again, created);

    let found = User::find_by_username(&db.pool, "alice").await?;
    assert_eq!(found, Some(created));
    Ok(())
}

#[tokio::test]
async fn test_concurrent_get_or_create_yields_one_row() -> Result<()> {
    let (db, _temp_dir) = setup_test_db().await;

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let pool = db.pool.clone();
            tokio::spawn(async move { User::get_or_create(&pool, "alice", ALICE_ID).await })
        })
        .collect();

    for handle in handles {
        let user = handle.await??;
        assert_eq!(user.id, ALICE_ID);
    }

    let count: i64 = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE username = 'alice'")
        .fetch_one(&db.pool)
        .await?;
    assert_eq!(count, 1);
    Ok(())
}

#[tokio::test]
async fn test_renamed_account_is_not_duplicated() -> Result<()> {
    let (db, _temp_dir) = setup_test_db().await;
    User::get_or_create(&db.pool, "alice", ALICE_ID).await?;

    // Same Telegram id under a new name: the id is already taken.
    let result = User::get_or_create(&db.pool, "alice_new", ALICE_ID).await;
    assert!(matches!(result, Err(sqlx::Error::RowNotFound)));
    Ok(())
}

#[tokio::test]
async fn test_append_and_last_feeding() -> Result<()> {
    let (db, _temp_dir) = setup_test_db().await;
    let alice = User::get_or_create(&db.pool, "alice", ALICE_ID).await?;

    assert!(FeedingLog::last_for_user(&db.pool, alice.id, chrono_tz::UTC).await?.is_none());
    assert!(FeedingLog::last_for_username(&db.pool, "nobody", chrono_tz::UTC).await?.is_none());

    let older = utc(test_now() - Duration::hours(3));
    let newer = utc(test_now() - Duration::minutes(15));
    // Appended out of order on purpose.
    let appended = FeedingLog::append(&db.pool, alice.id, newer, FeedingType::LeftBreast).await?;
    FeedingLog::append(&db.pool, alice.id, older, FeedingType::Bottle).await?;

    assert_eq!(appended.feeding_type, "LEFT_BREAST");
    assert_eq!(appended.timestamp, "2024-05-01T14:45:00+00:00");
    assert_eq!(appended.timestamp_utc.as_deref(), Some("2024-05-01T14:45:00.000000Z"));

    let last = FeedingLog::last_for_user(&db.pool, alice.id, chrono_tz::UTC)
        .await?
        .unwrap();
    assert_eq!(last.id, appended.id);
    assert_eq!(last.timestamp, newer);
    assert_eq!(last.feeding_type, FeedingType::LeftBreast);

    let by_name = FeedingLog::last_for_username(&db.pool, "alice", chrono_tz::UTC).await?;
    assert_eq!(by_name, Some(last));
    Ok(())
}

#[tokio::test]
async fn test_since_window_is_ordered_and_bounded() -> Result<()> {
    let (db, _temp_dir) = setup_test_db().await;
    let alice = User::get_or_create(&db.pool, "alice", ALICE_ID).await?;
    let bob = User::get_or_create(&db.pool, "bob", BOB_ID).await?;

    let since = test_now() - Duration::hours(24);
    for (hours_ago, user) in [(2, &alice), (30, &alice), (24, &alice), (10, &alice), (1, &bob)] {
        FeedingLog::append(
            &db.pool,
            user.id,
            utc(test_now() - Duration::hours(hours_ago)),
            FeedingType::Bottle,
        )
        .await?;
    }

    let records = FeedingLog::since_for_username(&db.pool, "alice", since, chrono_tz::UTC).await?;
    let hours_ago: Vec<i64> = records
        .iter()
        .map(|r| (test_now() - r.timestamp.with_timezone(&Utc)).num_hours())
        .collect();
    // The window start is inclusive.
    assert_eq!(hours_ago, vec![24, 10, 2]);
    assert!(records.iter().all(|r| r.user_id == alice.id));
    Ok(())
}

#[tokio::test]
async fn test_append_for_unknown_user_fails() -> Result<()> {
    let (db, _temp_dir) = setup_test_db().await;

    let result = FeedingLog::append(&db.pool, 999, utc(test_now()), FeedingType::Bottle).await;
    assert!(result.is_err());

    let count: i64 = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM feeding_logs")
        .fetch_one(&db.pool)
        .await?;
    assert_eq!(count, 0);
    Ok(())
}

#[tokio::test]
async fn test_legacy_rows_are_readable() -> Result<()> {
    let (db, _temp_dir) = setup_test_db().await;
    let alice = User::get_or_create(&db.pool, "alice", ALICE_ID).await?;

    for (timestamp, code) in [
        ("2024-05-01 10:00:00.123456", "7"),
        ("2024-05-01T12:30:00+03:00", "LEFT_BREAST"),
        ("2024-05-01 11:00:00", "9"),
        ("not a timestamp", "BOTTLE"),
        ("2024-05-01 13:00:00", "42"),
    ] {
        sqlx::query("INSERT INTO feeding_logs (user_id, timestamp, feeding_type) VALUES (?, ?, ?)")
            .bind(alice.id)
            .bind(timestamp)
            .bind(code)
            .execute(&db.pool)
            .await?;
    }

    // Naive rows are read in the storage zone; undecodable rows are skipped.
    let storage = chrono_tz::Europe::Moscow;
    let records = FeedingLog::since_for_username(
        &db.pool,
        "alice",
        Utc.with_ymd_and_hms(2024, 4, 30, 0, 0, 0).unwrap(),
        storage,
    )
    .await?;

    let decoded: Vec<(chrono::DateTime<Utc>, FeedingType)> = records
        .iter()
        .map(|r| (r.timestamp.with_timezone(&Utc), r.feeding_type))
        .collect();
    assert_eq!(
        decoded,
        vec![
            (
                Utc.with_ymd_and_hms(2024, 5, 1, 7, 0, 0).unwrap() + Duration::microseconds(123456),
                FeedingType::Bottle
            ),
            (Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap(), FeedingType::RightBreast),
            (Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap(), FeedingType::LeftBreast),
        ]
    );

    let last = FeedingLog::last_for_user(&db.pool, alice.id, storage).await?.unwrap();
    assert_eq!(last.feeding_type, FeedingType::LeftBreast);
    Ok(())
}

#[tokio::test]
async fn test_last_feeding_orders_by_instant_across_offsets() -> Result<()> {
    let (db, _temp_dir) = setup_test_db().await;
    let alice = User::get_or_create(&db.pool, "alice", ALICE_ID).await?;

    // 12:30 Moscow is 09:30 UTC, earlier than 10:00 UTC despite sorting later as text.
    let moscow = chrono_tz::Europe::Moscow
        .with_ymd_and_hms(2024, 5, 1, 12, 30, 0)
        .unwrap();
    let utc_ten = chrono_tz::UTC.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
    let latest = FeedingLog::append(&db.pool, alice.id, utc_ten, FeedingType::Bottle).await?;
    FeedingLog::append(&db.pool, alice.id, moscow, FeedingType::RightBreast).await?;

    let last = FeedingLog::last_for_user(&db.pool, alice.id, chrono_tz::UTC)
        .await?
        .unwrap();
    assert_eq!(last.id, latest.id);

    let window = FeedingLog::since_for_username(
        &db.pool,
        "alice",
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 45, 0).unwrap(),
        chrono_tz::UTC,
    )
    .await?;
    assert_eq!(window.iter().map(|r| r.id).collect::<Vec<_>>(), vec![latest.id]);
    Ok(())
}

#[tokio::test]
async fn test_legacy_rows_get_normalized_instants() -> Result<()> {
    let (db, _temp_dir) = setup_test_db().await;
    let alice = User::get_or_create(&db.pool, "alice", ALICE_ID).await?;

    for timestamp in ["2024-05-01 10:00:00", "2024-05-01T12:30:00+03:00", "garbage"] {
        sqlx::query("INSERT INTO feeding_logs (user_id, timestamp, feeding_type) VALUES (?, ?, 'BOTTLE')")
            .bind(alice.id)
            .bind(timestamp)
            .execute(&db.pool)
            .await?;
    }

    let updated = FeedingLog::normalize_pending(&db.pool, None, chrono_tz::Europe::Moscow).await?;
    assert_eq!(updated, 2);
    // Nothing left to do on a second pass; the unparseable row stays pending.
    assert_eq!(
        FeedingLog::normalize_pending(&db.pool, Some(alice.id), chrono_tz::Europe::Moscow).await?,
        0
    );

    let normalized: Vec<Option<String>> = FeedingLog::find_by_user(&db.pool, alice.id)
        .await?
        .into_iter()
        .map(|row| row.timestamp_utc)
        .collect();
    assert_eq!(
        normalized,
        vec![
            Some("2024-05-01T07:00:00.000000Z".to_string()),
            Some("2024-05-01T09:30:00.000000Z".to_string()),
            None,
        ]
    );
    Ok(())
}

#[test]
fn test_feeding_type_codes() {
    for feeding_type in FeedingType::ALL {
        assert_eq!(FeedingType::from_code(feeding_type.code()), Some(feeding_type));
    }
    assert_eq!(FeedingType::from_code("7"), Some(FeedingType::Bottle));
    assert_eq!(FeedingType::from_code("8"), Some(FeedingType::LeftBreast));
    assert_eq!(FeedingType::from_code("9"), Some(FeedingType::RightBreast));
    assert_eq!(FeedingType::from_code("bottle"), None);
}
