/// quick start - a consumer buys a cart on installments
use installment_shop::chrono::{TimeZone, Utc};
use installment_shop::records::ProductDraft;
use installment_shop::roles::enroll;
use installment_shop::telemetry::init_tracing;
use installment_shop::{
    register_consumer, seed_default_promos, sign_in, AddressChoice, ConsumerProfile,
    MemoryIdentity, MemoryStore, Money, PaymentFrequency, Role, SafeTimeProvider, Session,
    ShopConfig, ShopContext, TimeSource, UserRecord,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = ShopConfig::standard();
    let store = MemoryStore::new();
    let identity = MemoryIdentity::new(&config.accounts);
    let time = SafeTimeProvider::new(TimeSource::Test(Utc.with_ymd_and_hms(2024, 11, 14, 2, 0, 0).unwrap()));
    let ctx = ShopContext::new(&store, &time, &config)?;
    seed_default_promos(&store)?;

    // provision the admin
    let who = identity.create_account("admin@example.com", "rahasia1")?;
    let mut record = UserRecord::new_consumer("admin@example.com");
    record.role = Role::Admin;
    enroll(&store, &who, &record)?;

    let Session::Admin(mut admin) = sign_in(ctx, &identity, "admin@example.com", "rahasia1")? else {
        return Err("expected the admin desk".into());
    };
    let product = admin.create_product(ProductDraft {
        name: "Gerobak Bakso".to_string(),
        description: "Gerobak kayu dengan etalase kaca".to_string(),
        principal: Money::from_major(1_000_000),
        images: ProductDraft::parse_images("https://img/gerobak-1.jpg, https://img/gerobak-2.jpg"),
    })?;

    // a consumer signs up, completes the profile and checks out
    let Session::Consumer(mut siti) = register_consumer(ctx, &identity, "siti@example.com", "rahasia1")? else {
        return Err("expected a consumer session".into());
    };
    siti.save_profile(ConsumerProfile {
        full_name: "Siti Aminah".to_string(),
        business_type: "Warung bakso".to_string(),
        home_address: "Jl. Melati 4, Bandung".to_string(),
        business_address: "Pasar Baru 12, Bandung".to_string(),
        phone: "08123456789".to_string(),
        national_id: "3273000000000001".to_string(),
        sales_name: "Andi".to_string(),
    })?;

    for (days, installment) in siti.price_options(&product.id, PaymentFrequency::Daily)? {
        println!("{} days: {} per day", days, ctx.locale.rupiah(installment));
    }
    siti.add_to_cart(&product.id, 90, PaymentFrequency::Daily)?;
    siti.add_to_cart(&product.id, 60, PaymentFrequency::Weekly)?;
    println!("first installments: {}", ctx.locale.rupiah(siti.cart().first_installments()));

    let placed = siti.checkout(AddressChoice::Business)?;
    println!("placed {} orders", placed.len());

    for promo in siti.promos() {
        println!("promo ({:?}): {}", promo.kind, promo.url);
    }
    for bill in siti.orders() {
        println!("{}", bill.to_json_pretty()?);
    }

    Ok(())
}
