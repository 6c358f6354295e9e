//! The cooperative's launch catalog, used to seed an empty store.
//!
//! Recorded `sold_numbers` values predate the purchase records and do not
//! match them; the reconciliation report shows the drift.

use chrono::NaiveDate;

use crate::types::{Money, Participant, PaymentStatus, Raffle, RaffleStatus};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
}

pub fn raffles() -> Vec<Raffle> {
    vec![
        Raffle {
            id: "1".to_string(),
            title: "Moto Honda 2024".to_string(),
            description: "Honda CB 160F, 0 km, papers in order, 6 months insurance included"
                .to_string(),
            prize: "Honda CB 160F 2024 motorcycle".to_string(),
            price: Money::from_units(50),
            total_numbers: 1000,
            sold_numbers: 847,
            start_date: date(2024, 1, 1),
            end_date: date(2024, 2, 28),
            draw_date: date(2024, 3, 1),
            status: RaffleStatus::Active,
            image: None,
            qr_code: Some("QR001".to_string()),
        },
        Raffle {
            id: "2".to_string(),
            title: "Smart TV 65\"".to_string(),
            description: "Samsung QLED 4K 65 inch with 2-year official warranty".to_string(),
            prize: "Samsung QLED 65\" 4K Smart TV".to_string(),
            price: Money::from_units(25),
            total_numbers: 500,
            sold_numbers: 234,
            start_date: date(2024, 1, 15),
            end_date: date(2024, 3, 15),
            draw_date: date(2024, 3, 20),
            status: RaffleStatus::Active,
            image: None,
            qr_code: Some("QR002".to_string()),
        },
        Raffle {
            id: "3".to_string(),
            title: "iPhone 15 Pro".to_string(),
            description: "iPhone 15 Pro 256GB, Natural Titanium, sealed box".to_string(),
            prize: "iPhone 15 Pro 256GB Natural Titanium".to_string(),
            price: Money::from_units(75),
            total_numbers: 800,
            sold_numbers: 0,
            start_date: date(2024, 1, 15),
            end_date: date(2024, 4, 15),
            draw_date: date(2024, 4, 20),
            status: RaffleStatus::Upcoming,
            image: None,
            qr_code: Some("QR003".to_string()),
        },
    ]
}

pub fn participants() -> Vec<Participant> {
    vec![
        Participant {
            id: "1".to_string(),
            raffle_id: "1".to_string(),
            name: "Juan Pérez".to_string(),
            email: "juan@email.com".to_string(),
            phone: "+54 11 1234-5678".to_string(),
            numbers: vec![123, 456, 789],
            total_paid: Money::from_units(150),
            payment_status: PaymentStatus::Completed,
            purchase_date: date(2024, 1, 10),
        },
        Participant {
            id: "2".to_string(),
            raffle_id: "1".to_string(),
            name: "María González".to_string(),
            email: "maria@email.com".to_string(),
            phone: "+54 11 9876-5432".to_string(),
            numbers: vec![100, 200],
            total_paid: Money::from_units(100),
            payment_status: PaymentStatus::Completed,
            purchase_date: date(2024, 1, 12),
        },
        Participant {
            id: "3".to_string(),
            raffle_id: "2".to_string(),
            name: "Carlos López".to_string(),
            email: "carlos@email.com".to_string(),
            phone: "+54 11 5555-1234".to_string(),
            numbers: vec![50, 75, 100, 125],
            total_paid: Money::from_units(100),
            payment_status: PaymentStatus::Pending,
            purchase_date: date(2024, 1, 14),
        },
    ]
}
