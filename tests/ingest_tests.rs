//! Integration tests for the ingestion pipeline against in-memory SQLite.

use anyhow::Result;
use chrono::Duration;
use popcorn::identity::ResolveError;
use popcorn::ingest::{IngestError, IngestService, Upload};
use popcorn::models::{
    Distro, Package, Submission, SubmissionPackage, System, Vendor, submission, system, vendor,
};
use popcorn::report::{FormatError, PackageStatus};
use popcorn::repositories::{
    DistroRepository, PackageRepository, SubmissionRepository, SystemRepository,
};
use popcorn::throttle::SubmissionThrottle;
use sea_orm::{ConnectionTrait, EntityTrait, Statement};

#[path = "test_utils/mod.rs"]
mod test_utils;
use test_utils::{
    HW_UUID, all_statuses_report, count_rows, example_report, gzip, ingest_service, report_for,
    setup_test_db_arc, t0,
};

#[tokio::test]
async fn example_report_creates_expected_records() -> Result<()> {
    let db = setup_test_db_arc().await?;
    let service = ingest_service(db.clone(), SubmissionThrottle::default());

    let receipt = service.ingest_at(Upload::new(example_report()), t0()).await?;

    assert_eq!(receipt.packages, 1);
    assert_eq!(receipt.new_packages, 1);

    assert_eq!(SystemRepository::new(db.clone()).count().await?, 1);
    let systems = System::find().all(&*db).await?;
    let system::Model { hw_uuid, arch, .. } = &systems[0];
    assert_eq!(hw_uuid, HW_UUID);
    assert_eq!(arch, "x86_64");

    let vendors = Vendor::find().all(&*db).await?;
    assert_eq!(vendors.len(), 1);
    let vendor::Model { name, url, .. } = &vendors[0];
    assert_eq!(name, "openSUSE");
    assert_eq!(url, "openSUSE");

    let submission = Submission::find_by_id(receipt.submission_id)
        .one(&*db)
        .await?
        .expect("submission stored");
    let submission::Model {
        system_id,
        arch,
        popcorn_version,
        submitted_at,
        ..
    } = submission;
    assert_eq!(system_id, receipt.system_id);
    assert_eq!(arch, "x86_64");
    assert_eq!(popcorn_version, "0.1");
    assert_eq!(submitted_at, t0().fixed_offset());

    let facts = SubmissionRepository::new(db.clone())
        .package_facts(receipt.submission_id)
        .await?;
    assert_eq!(facts.len(), 1);
    assert_eq!(facts[0].name, "sed");
    assert_eq!(facts[0].version, "4.2.1");
    assert_eq!(facts[0].release, "5.1.2");
    assert_eq!(facts[0].epoch, "");
    assert_eq!(facts[0].arch, "x86_64");
    assert_eq!(facts[0].vendor, "openSUSE");
    assert_eq!(facts[0].status, "voted");

    let distros = Distro::find().all(&*db).await?;
    assert_eq!(distros.len(), 1);
    assert_eq!(distros[0].name, "unknown");
    assert_eq!(distros[0].version, "unknown");
    Ok(())
}

#[tokio::test]
async fn each_status_is_counted_once() -> Result<()> {
    let db = setup_test_db_arc().await?;
    let service = ingest_service(db.clone(), SubmissionThrottle::default());

    service
        .ingest_at(Upload::new(all_statuses_report(HW_UUID)), t0())
        .await?;

    let ids: Vec<i32> = Package::find()
        .all(&*db)
        .await?
        .into_iter()
        .map(|package| package.id)
        .collect();
    assert_eq!(ids.len(), 4);

    let counts = PackageRepository::new(db.clone()).status_counts(&ids).await?;
    assert_eq!(counts.voted, 1);
    assert_eq!(counts.recent, 1);
    assert_eq!(counts.old, 1);
    assert_eq!(counts.nofiles, 1);
    assert_eq!(counts.total(), 4);
    for status in PackageStatus::ALL {
        assert_eq!(counts.get(status), 1, "{status}");
    }
    Ok(())
}

#[tokio::test]
async fn malformed_line_rejects_whole_report() -> Result<()> {
    let db = setup_test_db_arc().await?;
    let service = ingest_service(db.clone(), SubmissionThrottle::default());
    let payload = report_for(
        HW_UUID,
        &[
            "v sed 4.2.1 5.1.2 x86_64 openSUSE",
            "x grep 2.5.4 1.1 x86_64 openSUSE",
        ],
    );

    let err = service
        .ingest_at(Upload::new(payload), t0())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        IngestError::Format(FormatError::UnknownStatus { line: 3, .. })
    ));
    assert_eq!(count_rows::<System>(&db).await, 0);
    assert_eq!(count_rows::<Submission>(&db).await, 0);
    assert_eq!(count_rows::<SubmissionPackage>(&db).await, 0);
    Ok(())
}

#[tokio::test]
async fn storage_failure_mid_report_rolls_back_everything() -> Result<()> {
    let db = setup_test_db_arc().await?;
    let service = ingest_service(db.clone(), SubmissionThrottle::default());
    db.execute(Statement::from_string(
        db.get_database_backend(),
        "DROP TABLE submission_packages".to_string(),
    ))
    .await?;

    let err = service
        .ingest_at(Upload::new(all_statuses_report(HW_UUID)), t0())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        IngestError::Storage(_) | IngestError::Resolve(ResolveError::Storage(_))
    ));
    assert_eq!(count_rows::<System>(&db).await, 0);
    assert_eq!(count_rows::<Vendor>(&db).await, 0);
    assert_eq!(count_rows::<Distro>(&db).await, 0);
    assert_eq!(count_rows::<Package>(&db).await, 0);
    assert_eq!(count_rows::<Submission>(&db).await, 0);
    Ok(())
}

async fn facts_after_ingesting(upload: Upload) -> Result<Vec<(String, String)>> {
    let db = setup_test_db_arc().await?;
    let service = ingest_service(db.clone(), SubmissionThrottle::default());
    let receipt = service.ingest_at(upload, t0()).await?;

    Ok(SubmissionRepository::new(db)
        .package_facts(receipt.submission_id)
        .await?
        .into_iter()
        .map(|fact| (fact.name, fact.status))
        .collect())
}

#[tokio::test]
async fn gzip_framing_is_tolerated_either_way() -> Result<()> {
    let plain = all_statuses_report(HW_UUID);
    let compressed = gzip(&plain);

    let from_plain = facts_after_ingesting(Upload::new(plain.clone())).await?;
    let from_declared = facts_after_ingesting(
        Upload::new(compressed.clone()).with_content_encoding(Some("gzip")),
    )
    .await?;
    let from_sniffed = facts_after_ingesting(Upload::new(compressed)).await?;
    let from_mislabeled =
        facts_after_ingesting(Upload::new(plain).with_content_encoding(Some("gzip"))).await?;

    assert_eq!(from_plain.len(), 4);
    assert_eq!(from_plain, from_declared);
    assert_eq!(from_plain, from_sniffed);
    assert_eq!(from_plain, from_mislabeled);
    Ok(())
}

#[tokio::test]
async fn throttle_applies_per_system() -> Result<()> {
    let db = setup_test_db_arc().await?;
    let service = ingest_service(db.clone(), SubmissionThrottle::new(Duration::days(1)));

    service
        .ingest_at(Upload::new(example_report()), t0())
        .await?;

    let err = service
        .ingest_at(Upload::new(example_report()), t0() + Duration::seconds(1))
        .await
        .unwrap_err();
    match err {
        IngestError::EarlySubmission(early) => {
            assert_eq!(early.last_submitted_at, t0());
            assert_eq!(early.retry_at, t0() + Duration::days(1));
        }
        other => panic!("expected early submission, got {other:?}"),
    }
    assert_eq!(count_rows::<Submission>(&db).await, 1);

    // Another machine is not affected
    service
        .ingest_at(
            Upload::new(report_for("another-machine", &["v sed 4.2.1 5.1.2 x86_64 openSUSE"])),
            t0() + Duration::seconds(1),
        )
        .await?;

    service
        .ingest_at(Upload::new(example_report()), t0() + Duration::days(2))
        .await?;
    assert_eq!(count_rows::<Submission>(&db).await, 3);
    Ok(())
}

#[tokio::test]
async fn repeated_packages_share_one_identity() -> Result<()> {
    let db = setup_test_db_arc().await?;
    let service = ingest_service(db.clone(), SubmissionThrottle::disabled());
    let lines = [
        "v sed 4.2.1 5.1.2 x86_64 openSUSE",
        "o sed 4.2.1 5.1.2 x86_64 openSUSE",
    ];

    let first = service
        .ingest_at(Upload::new(report_for(HW_UUID, &lines)), t0())
        .await?;
    let second = service
        .ingest_at(Upload::new(report_for("other", &lines)), t0())
        .await?;

    assert_eq!(first.packages, 2);
    assert_eq!(first.new_packages, 1);
    assert_eq!(second.new_packages, 0);
    assert_eq!(count_rows::<Package>(&db).await, 1);
    assert_eq!(count_rows::<Vendor>(&db).await, 1);
    assert_eq!(count_rows::<SubmissionPackage>(&db).await, 4);
    Ok(())
}

#[tokio::test]
async fn uploaded_distro_drives_aggregates() -> Result<()> {
    let db = setup_test_db_arc().await?;
    let service = ingest_service(db.clone(), SubmissionThrottle::default());

    service
        .ingest_at(
            Upload::new(all_statuses_report(HW_UUID)).with_distro("openSUSE", "11.2"),
            t0(),
        )
        .await?;
    service
        .ingest_at(
            Upload::new(example_report_for("second")).with_distro("openSUSE", "11.3"),
            t0(),
        )
        .await?;

    let distros = DistroRepository::new(db.clone());
    assert_eq!(
        distros.submission_counts().await?,
        vec![
            ("openSUSE".to_string(), "11.2".to_string(), 1),
            ("openSUSE".to_string(), "11.3".to_string(), 1),
        ]
    );
    assert_eq!(
        distros.package_fact_counts().await?,
        vec![("openSUSE".to_string(), 5)]
    );
    Ok(())
}

fn example_report_for(hw_uuid: &str) -> Vec<u8> {
    report_for(hw_uuid, &["v sed 4.2.1 5.1.2 x86_64 openSUSE"])
}

#[tokio::test]
async fn oversize_reports_are_rejected() -> Result<()> {
    let db = setup_test_db_arc().await?;
    let service = IngestService::new(db.clone(), SubmissionThrottle::default(), 64);
    let payload = all_statuses_report(HW_UUID);
    assert!(payload.len() > 64);

    let err = service
        .ingest_at(Upload::new(gzip(&payload)), t0())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        IngestError::Format(FormatError::TooLarge { limit: 64 })
    ));
    assert_eq!(count_rows::<Submission>(&db).await, 0);
    Ok(())
}

#[tokio::test]
async fn vendor_names_keep_inner_spaces() -> Result<()> {
    let db = setup_test_db_arc().await?;
    let service = ingest_service(db.clone(), SubmissionThrottle::default());

    service
        .ingest_at(
            Upload::new(report_for(
                HW_UUID,
                &["r glibc 2.11 1.1 i586 SUSE LINUX Products GmbH, Nuernberg, Germany"],
            )),
            t0(),
        )
        .await?;

    let vendors = Vendor::find().all(&*db).await?;
    assert_eq!(vendors.len(), 1);
    assert_eq!(vendors[0].name, "SUSE LINUX Products GmbH, Nuernberg, Germany");
    Ok(())
}

