//! Personas and campaigns. Skipped when DATABASE_URL is unset.

use leadforge_db::test_fixtures::TestTenant;
use leadforge_db::{
    CampaignCounter, CampaignStatus, CreatePersonaRequest, Error, LeadStatus, StatusWrite,
};

#[tokio::test]
async fn test_first_persona_is_default_and_default_is_unique() {
    let Some(t) = TestTenant::create().await else {
        return;
    };
    let first = t.persona("Sam").await;
    let second = t.persona("Alex").await;
    assert!(first.is_default);
    assert!(!second.is_default);

    let promoted = t.db.personas.set_default(t.company.id, second.id).await.unwrap();
    assert!(promoted.is_default);

    let all = t.db.personas.list(t.company.id).await.unwrap();
    assert_eq!(all.iter().filter(|p| p.is_default).count(), 1);
    assert_eq!(all[0].id, second.id, "default persona lists first");

    let explicit = t
        .db
        .personas
        .create(
            t.company.id,
            &CreatePersonaRequest {
                name: "Jordan".into(),
                is_default: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let default = t.db.personas.get_default(t.company.id).await.unwrap().unwrap();
    assert_eq!(default.id, explicit.id);
}

#[tokio::test]
async fn test_deleting_default_promotes_oldest_remaining() {
    let Some(t) = TestTenant::create().await else {
        return;
    };
    let first = t.persona("First").await;
    let second = t.persona("Second").await;
    t.persona("Third").await;

    t.db.personas.delete(t.company.id, first.id).await.unwrap();
    let default = t.db.personas.get_default(t.company.id).await.unwrap().unwrap();
    assert_eq!(default.id, second.id);
}

#[tokio::test]
async fn test_persona_in_use_cannot_be_deleted() {
    let Some(t) = TestTenant::create().await else {
        return;
    };
    let persona = t.persona("Busy").await;
    t.db.campaigns
        .create(t.company.id, persona.id, "Q3 outreach", None)
        .await
        .unwrap();

    let err = t.db.personas.delete(t.company.id, persona.id).await.unwrap_err();
    assert!(matches!(err, Error::Conflict(_)), "got {err:?}");
}

#[tokio::test]
async fn test_campaign_requires_own_persona() {
    let Some(t) = TestTenant::create().await else {
        return;
    };
    let other = TestTenant::create_in(t.db.clone()).await;
    let foreign = other.persona("Theirs").await;

    let err = t
        .db
        .campaigns
        .create(t.company.id, foreign.id, "Sneaky", None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn test_enroll_skips_closed_duplicate_and_foreign_leads() {
    let Some(t) = TestTenant::create().await else {
        return;
    };
    let other = TestTenant::create_in(t.db.clone()).await;
    let persona = t.persona("Sam").await;
    let campaign = t
        .db
        .campaigns
        .create(t.company.id, persona.id, "Launch", Some("Hi {{first_name}}"))
        .await
        .unwrap();

    let open = t.lead("open@example.com").await;
    let gone = t.lead("gone@example.com").await;
    t.db.leads
        .transition(
            t.company.id,
            gone.id,
            &StatusWrite {
                from: LeadStatus::New,
                to: LeadStatus::Unsubscribed,
                score: 0,
                reason: None,
                actor_id: None,
            },
        )
        .await
        .unwrap();
    let foreign = other.lead("foreign@example.com").await;

    let res = t
        .db
        .campaigns
        .enroll(t.company.id, campaign.id, &[open.id, gone.id, foreign.id, open.id])
        .await
        .unwrap();
    assert_eq!(res.enrolled, 1);
    assert_eq!(res.skipped, 2);
    assert_eq!(res.lead_count, 1);

    let again = t
        .db
        .campaigns
        .enroll(t.company.id, campaign.id, &[open.id])
        .await
        .unwrap();
    assert_eq!(again.enrolled, 0);
    assert_eq!(again.skipped, 1);

    assert_eq!(t.db.campaigns.count_uncontacted(t.company.id, campaign.id).await.unwrap(), 1);
    let enrolled = t.db.campaigns.enrolled_leads(t.company.id, campaign.id).await.unwrap();
    assert_eq!(enrolled.len(), 1);
    assert_eq!(enrolled[0].id, open.id);
}

#[tokio::test]
async fn test_status_changes_and_counters() {
    let Some(t) = TestTenant::create().await else {
        return;
    };
    let persona = t.persona("Sam").await;
    let campaign = t
        .db
        .campaigns
        .create(t.company.id, persona.id, "Launch", None)
        .await
        .unwrap();
    assert_eq!(campaign.status, CampaignStatus::Draft);
    assert!(campaign.launched_at.is_none());

    let active = t
        .db
        .campaigns
        .set_status(t.company.id, campaign.id, CampaignStatus::Draft, CampaignStatus::Active, Some(t.owner.id))
        .await
        .unwrap();
    assert_eq!(active.status, CampaignStatus::Active);
    assert!(active.launched_at.is_some());

    // Running campaigns are not editable and cannot take new leads.
    let lead = t.lead("late@example.com").await;
    let err = t
        .db
        .campaigns
        .enroll(t.company.id, campaign.id, &[lead.id])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));

    // A stale expected status loses.
    let err = t
        .db
        .campaigns
        .set_status(t.company.id, campaign.id, CampaignStatus::Draft, CampaignStatus::Active, None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));

    assert!(t
        .db
        .campaigns
        .bump_counter(t.company.id, campaign.id, CampaignCounter::Reply)
        .await
        .unwrap());
    let reloaded = t.db.campaigns.get(t.company.id, campaign.id).await.unwrap();
    assert_eq!(reloaded.reply_count, 1);
    assert_eq!(reloaded.sent_count, 0);
}
