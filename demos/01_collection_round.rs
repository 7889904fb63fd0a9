/// collection round - ship, assign a collector and collect until paid off
use installment_shop::chrono::{Duration, TimeZone, Utc};
use installment_shop::records::ProductDraft;
use installment_shop::roles::enroll;
use installment_shop::telemetry::init_tracing;
use installment_shop::{
    register_consumer, sign_in, AddressChoice, ConsumerProfile, Identity, MemoryIdentity,
    MemoryStore, Money, PaymentFrequency, Role, SafeTimeProvider, Session, ShopConfig,
    ShopContext, TimeSource, UserRecord,
};

fn staff(
    store: &MemoryStore,
    identity: &MemoryIdentity,
    email: &str,
    role: Role,
    name: &str,
) -> Result<Identity, Box<dyn std::error::Error>> {
    let who = identity.create_account(email, "rahasia1")?;
    let mut record = UserRecord::new_consumer(email);
    record.role = role;
    record.name = name.to_string();
    record.profile.full_name = name.to_string();
    enroll(store, &who, &record)?;
    Ok(who)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = ShopConfig::standard();
    let store = MemoryStore::new();
    let identity = MemoryIdentity::new(&config.accounts);
    let time = SafeTimeProvider::new(TimeSource::Test(Utc.with_ymd_and_hms(2024, 11, 14, 2, 0, 0).unwrap()));
    let ctx = ShopContext::new(&store, &time, &config)?;

    staff(&store, &identity, "admin@example.com", Role::Admin, "Admin")?;
    staff(&store, &identity, "budi@example.com", Role::Collector, "Budi Santoso")?;

    let Session::Admin(mut admin) = sign_in(ctx, &identity, "admin@example.com", "rahasia1")? else {
        return Err("expected the admin desk".into());
    };
    let product = admin.create_product(ProductDraft {
        name: "Etalase Kaca".to_string(),
        description: String::new(),
        principal: Money::from_major(600_000),
        images: vec!["https://img/etalase.jpg".to_string()],
    })?;

    let Session::Consumer(mut siti) = register_consumer(ctx, &identity, "siti@example.com", "rahasia1")? else {
        return Err("expected a consumer session".into());
    };
    siti.save_profile(ConsumerProfile {
        full_name: "Siti Aminah".to_string(),
        business_type: "Warung".to_string(),
        home_address: "Jl. Melati 4, Bandung".to_string(),
        business_address: "Pasar Baru 12, Bandung".to_string(),
        phone: "08123456789".to_string(),
        national_id: "3273000000000001".to_string(),
        sales_name: String::new(),
    })?;
    siti.add_to_cart(&product.id, 60, PaymentFrequency::Daily)?;
    let order_id = siti.checkout(AddressChoice::Home)?.remove(0);

    // fulfilment
    admin.ship(&order_id)?;
    admin.mark_delivered(&order_id)?;
    for line in admin.awaiting_collector() {
        println!("awaiting collector: {} for {}", line.product_name, line.consumer_name);
    }
    let budi_uid = admin
        .collectors()
        .into_iter()
        .find(|c| c.name == "Budi Santoso")
        .map(|c| c.uid)
        .ok_or("collector not provisioned")?;
    admin.assign_collector(&order_id, &budi_uid)?;

    let Session::Collector(mut budi) = sign_in(ctx, &identity, "budi@example.com", "rahasia1")? else {
        return Err("expected the collector round".into());
    };

    // first visit, the consumer hears about it
    budi.record_payment(&order_id)?;
    for notice in siti.next_payment_notices().await? {
        println!(
            "payment {} for {} received, {} to go",
            notice.installment_number, notice.product_name, notice.remaining
        );
    }
    let stats = budi.daily_stats();
    println!(
        "today: {} active, {} collected, {} pending",
        stats.active, stats.collected_today, stats.pending_today
    );

    // the remaining visits, one per day
    let control = time.test_control().expect("demo clock runs under test control");
    loop {
        control.advance(Duration::days(1));
        let receipt = budi.record_payment(&order_id)?;
        if receipt.settled() {
            println!("paid off on installment {}", receipt.installment_number);
            break;
        }
    }

    println!("{}", admin.bill(&order_id)?.to_json_pretty()?);
    println!("history entries: {}", budi.history().len());
    Ok(())
}
