//! Deterministic seed tree.
//!
//! The provisional state a fresh process works against until the first
//! authoritative snapshot arrives. Fully fixed, with no clocks and no
//! generated ids, so tests and recovery paths are reproducible.

use serde_json::{json, Value};

pub fn seed_tree() -> Value {
    json!({
        "settings": {
            "restaurantName": "RestroFlow",
            "taxRate": 10,
            "serviceChargeRate": 5,
            "currency": "USD"
        },

        "users": [
            { "id": "u1", "name": "Alex", "pin": "1111", "role": "manager", "active": true },
            { "id": "u2", "name": "Maria", "pin": "2222", "role": "waiter", "active": true },
            { "id": "u3", "name": "James", "pin": "3333", "role": "waiter", "active": true },
            { "id": "u4", "name": "Chef K", "pin": "4444", "role": "kitchen", "active": true },
            { "id": "u5", "name": "Sam", "pin": "5555", "role": "cashier", "active": true }
        ],

        "categories": [
            { "id": "cat1", "name": "Starters", "sortOrder": 1 },
            { "id": "cat2", "name": "Mains", "sortOrder": 2 },
            { "id": "cat3", "name": "Pizza", "sortOrder": 3 },
            { "id": "cat4", "name": "Desserts", "sortOrder": 4 },
            { "id": "cat5", "name": "Drinks", "sortOrder": 5 }
        ],

        "modifierGroups": [
            {
                "id": "mg1", "name": "Size", "required": true, "multiSelect": false,
                "options": [
                    { "id": "mg1-s", "name": "Small", "price": 0 },
                    { "id": "mg1-m", "name": "Medium", "price": 200 },
                    { "id": "mg1-l", "name": "Large", "price": 400 }
                ]
            },
            {
                "id": "mg2", "name": "Add-ons", "required": false, "multiSelect": true,
                "options": [
                    { "id": "mg2-cheese", "name": "Extra Cheese", "price": 150 },
                    { "id": "mg2-bacon", "name": "Bacon", "price": 200 },
                    { "id": "mg2-mushroom", "name": "Mushrooms", "price": 100 }
                ]
            }
        ],

        "menuItems": [
            { "id": "mi1", "categoryId": "cat1", "name": "Bruschetta", "price": 850, "description": "Toasted bread with tomato & basil", "modifierGroups": [], "available": true },
            { "id": "mi2", "categoryId": "cat1", "name": "Caesar Salad", "price": 950, "description": "Romaine, croutons, parmesan", "modifierGroups": ["mg2"], "available": true },
            { "id": "mi3", "categoryId": "cat2", "name": "Grilled Salmon", "price": 2200, "description": "Atlantic salmon with herb butter", "modifierGroups": [], "available": true },
            { "id": "mi4", "categoryId": "cat2", "name": "Ribeye Steak", "price": 2800, "description": "10oz prime cut, choice of sides", "modifierGroups": [], "available": true },
            { "id": "mi5", "categoryId": "cat3", "name": "Margherita", "price": 1400, "description": "Tomato, mozzarella, fresh basil", "modifierGroups": ["mg1", "mg2"], "available": true },
            { "id": "mi6", "categoryId": "cat3", "name": "Pepperoni", "price": 1600, "description": "Classic pepperoni with mozzarella", "modifierGroups": ["mg1", "mg2"], "available": true },
            { "id": "mi7", "categoryId": "cat4", "name": "Tiramisu", "price": 900, "description": "Classic Italian coffee dessert", "modifierGroups": [], "available": true },
            { "id": "mi8", "categoryId": "cat5", "name": "Fresh Juice", "price": 500, "description": "Orange, apple, or mango", "modifierGroups": ["mg1"], "available": true },
            { "id": "mi9", "categoryId": "cat5", "name": "Coffee", "price": 400, "description": "Espresso, latte, or cappuccino", "modifierGroups": ["mg1"], "available": true }
        ],

        "tables": [
            { "id": "t1", "name": "Table 1", "section": "Main Floor", "capacity": 2, "status": "available", "sessionId": null, "waiterId": null },
            { "id": "t2", "name": "Table 2", "section": "Main Floor", "capacity": 4, "status": "available", "sessionId": null, "waiterId": null },
            { "id": "t3", "name": "Table 3", "section": "Main Floor", "capacity": 6, "status": "available", "sessionId": null, "waiterId": null },
            { "id": "t4", "name": "Table 4", "section": "Patio", "capacity": 4, "status": "available", "sessionId": null, "waiterId": null },
            { "id": "t5", "name": "Table 5", "section": "Patio", "capacity": 2, "status": "available", "sessionId": null, "waiterId": null },
            { "id": "t6", "name": "Table 6", "section": "VIP Room", "capacity": 8, "status": "available", "sessionId": null, "waiterId": null }
        ],

        "sessions": [],
        "orders": [],
        "bills": [],
        "auditLog": []
    })
}
