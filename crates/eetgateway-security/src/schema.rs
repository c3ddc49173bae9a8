// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Mapping between the data model and the regulated body elements.
//
// Element and attribute names are fixed by the authority's schema and kept
// verbatim; attribute order follows the schema so the body is stable.

use eetgateway_core::confirmation::{ConfirmationHeader, ConfirmationRecord, ErrorIndicator, Warning};
use eetgateway_core::error::SchemaError;
use eetgateway_core::sale::{HashCode, SaleRecord, SignatureCode};
use eetgateway_core::types::{Amount, EetDateTime};

use crate::xml::Element;

/// Namespace of the sale and confirmation payloads.
pub const EET_NS: &str = "http://fs.mfcr.cz/eet/schema/v3";

fn xsd_bool(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}

fn parse_bool(field: &str, value: &str) -> Result<bool, SchemaError> {
    match value.trim() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(SchemaError::invalid_field(field, format!("{other:?} is not a boolean"))),
    }
}

fn set_amount(element: &mut Element, key: &str, amount: Option<Amount>) {
    if let Some(amount) = amount {
        element.set_attr(key, amount.to_string());
    }
}

/// `eet:Trzba` for a record whose security codes are set.
pub fn sale_to_element(record: &SaleRecord) -> Result<Element, SchemaError> {
    let codes = record
        .security_codes()
        .ok_or(SchemaError::MissingSecurityCodes)?;
    let header = record.header();
    let data = record.data();

    let hlavicka = Element::new("eet:Hlavicka")
        .with_attr("uuid_zpravy", header.message_uuid.as_str())
        .with_attr("dat_odesl", header.sent_at.to_string())
        .with_attr("prvni_zaslani", xsd_bool(header.first_submission))
        .with_attr("overeni", xsd_bool(header.verification_only));

    let mut body = Element::new("eet:Data").with_attr("dic_popl", data.taxpayer_id.as_str());
    if let Some(delegating) = &data.delegating_taxpayer_id {
        body.set_attr("dic_poverujiciho", delegating.as_str());
    }
    body.set_attr("id_provoz", data.premises_id.to_string());
    body.set_attr("id_pokl", data.register_id.as_str());
    body.set_attr("porad_cis", data.receipt_number.as_str());
    body.set_attr("dat_trzby", data.sold_at.to_string());
    body.set_attr("celk_trzba", data.total.to_string());
    let vat = &data.vat;
    set_amount(&mut body, "zakl_nepodl_dph", vat.exempt);
    set_amount(&mut body, "zakl_dan1", vat.standard_base);
    set_amount(&mut body, "dan1", vat.standard_tax);
    set_amount(&mut body, "zakl_dan2", vat.reduced1_base);
    set_amount(&mut body, "dan2", vat.reduced1_tax);
    set_amount(&mut body, "zakl_dan3", vat.reduced2_base);
    set_amount(&mut body, "dan3", vat.reduced2_tax);
    set_amount(&mut body, "cest_sluz", vat.travel_service);
    set_amount(&mut body, "pouzit_zboz1", vat.used_goods_standard);
    set_amount(&mut body, "pouzit_zboz2", vat.used_goods_reduced1);
    set_amount(&mut body, "pouzit_zboz3", vat.used_goods_reduced2);
    set_amount(&mut body, "urceno_cerp_zuct", vat.voucher_issued);
    set_amount(&mut body, "cerp_zuct", vat.voucher_redeemed);
    body.set_attr("rezim", data.regime.code().to_string());

    let pkp = Element::new("eet:pkp")
        .with_attr("digest", SignatureCode::DIGEST)
        .with_attr("cipher", SignatureCode::CIPHER)
        .with_attr("encoding", SignatureCode::ENCODING)
        .with_text(codes.signature_code.to_base64());
    let bkp = Element::new("eet:bkp")
        .with_attr("digest", HashCode::DIGEST)
        .with_attr("encoding", HashCode::ENCODING)
        .with_text(codes.hash_code.as_str());

    Ok(Element::new("eet:Trzba")
        .with_child(hlavicka)
        .with_child(body)
        .with_child(Element::new("eet:KontrolniKody").with_child(pkp).with_child(bkp)))
}

/// Decode an `Odpoved` element.
pub fn confirmation_from_element(odpoved: &Element) -> Result<ConfirmationRecord, SchemaError> {
    let mut record = ConfirmationRecord::default();

    if let Some(hlavicka) = odpoved.child("Hlavicka") {
        record.header = ConfirmationHeader {
            message_uuid: hlavicka.attr("uuid_zpravy").map(str::to_owned),
            hash_code: hlavicka.attr("bkp").map(str::to_owned),
            fiscal_code: None,
            received_at: hlavicka.attr("dat_prij").map(EetDateTime::parse).transpose()?,
            rejected_at: hlavicka.attr("dat_odmit").map(EetDateTime::parse).transpose()?,
        };
    }

    if let Some(potvrzeni) = odpoved.child("Potvrzeni") {
        record.header.fiscal_code = potvrzeni.attr("fik").map(str::to_owned);
        if let Some(test) = potvrzeni.attr("test") {
            record.test = parse_bool("test", test)?;
        }
    }

    if let Some(chyba) = odpoved.child("Chyba") {
        record.error = Some(ErrorIndicator {
            code: parse_code("kod", chyba.attr("kod"))?,
            description: chyba.text(),
        });
        if let Some(test) = chyba.attr("test") {
            record.test = parse_bool("test", test)?;
        }
    }

    for varovani in odpoved.child_elements().filter(|e| e.name == "Varovani") {
        record.warnings.push(Warning {
            code: parse_code("kod_varov", varovani.attr("kod_varov"))?,
            description: varovani.text(),
        });
    }

    Ok(record)
}

fn parse_code(field: &str, value: Option<&str>) -> Result<i32, SchemaError> {
    let value = value.ok_or_else(|| SchemaError::invalid_field(field, "missing"))?;
    value
        .trim()
        .parse()
        .map_err(|_| SchemaError::invalid_field(field, format!("{value:?} is not an integer")))
}

/// `eet:Odpoved` for a confirmation.  Only the authority produces these; the
/// gateway uses it to play the authority in tests and tooling.
pub fn confirmation_to_element(record: &ConfirmationRecord) -> Element {
    let header = &record.header;
    let mut hlavicka = Element::new("eet:Hlavicka");
    if let Some(uuid) = &header.message_uuid {
        hlavicka.set_attr("uuid_zpravy", uuid.as_str());
    }
    if let Some(bkp) = &header.hash_code {
        hlavicka.set_attr("bkp", bkp.as_str());
    }
    if let Some(at) = &header.received_at {
        hlavicka.set_attr("dat_prij", at.to_string());
    }
    if let Some(at) = &header.rejected_at {
        hlavicka.set_attr("dat_odmit", at.to_string());
    }

    let mut odpoved = Element::new("eet:Odpoved").with_child(hlavicka);
    if let Some(fik) = &header.fiscal_code {
        odpoved.push_child(
            Element::new("eet:Potvrzeni")
                .with_attr("fik", fik.as_str())
                .with_attr("test", xsd_bool(record.test)),
        );
    }
    if let Some(error) = &record.error {
        odpoved.push_child(
            Element::new("eet:Chyba")
                .with_attr("kod", error.code.to_string())
                .with_attr("test", xsd_bool(record.test))
                .with_text(error.description.as_str()),
        );
    }
    for warning in &record.warnings {
        odpoved.push_child(
            Element::new("eet:Varovani")
                .with_attr("kod_varov", warning.code.to_string())
                .with_text(warning.description.as_str()),
        );
    }
    odpoved
}

#[cfg(test)]
mod tests {
    use eetgateway_core::sale::{SaleData, SaleHeader, SecurityCodes, VatBreakdown};
    use eetgateway_core::types::{MessageUuid, Regime};

    use super::*;

    fn record() -> SaleRecord {
        let header = SaleHeader {
            message_uuid: MessageUuid::parse("e3ac1ba5-1a4e-4e8b-9c46-6a3a0e7c2c7d").unwrap(),
            sent_at: EetDateTime::parse("2019-08-11T15:37:52+02:00").unwrap(),
            first_submission: true,
            verification_only: false,
        };
        let data = SaleData {
            taxpayer_id: "CZ00000019".into(),
            delegating_taxpayer_id: None,
            premises_id: 141,
            register_id: "1patro-vpravo".into(),
            receipt_number: "141-18543-05".into(),
            sold_at: EetDateTime::parse("2019-08-11T15:36:14+02:00").unwrap(),
            total: Amount::parse("236.00").unwrap(),
            vat: VatBreakdown {
                standard_base: Some(Amount::parse("100.00").unwrap()),
                standard_tax: Some(Amount::parse("21.00").unwrap()),
                ..VatBreakdown::default()
            },
            regime: Regime::Standard,
        };
        SaleRecord::new(header, data)
    }

    fn with_codes(mut record: SaleRecord) -> SaleRecord {
        record
            .attach_security_codes(SecurityCodes::from_signature_code(SignatureCode::from_bytes(
                vec![0xde, 0xad, 0xbe, 0xef],
            )))
            .unwrap();
        record
    }

    #[test]
    fn sale_without_codes_is_refused() {
        assert!(matches!(
            sale_to_element(&record()),
            Err(SchemaError::MissingSecurityCodes)
        ));
    }

    #[test]
    fn sale_serialises_in_schema_order() {
        let trzba = sale_to_element(&with_codes(record())).unwrap();
        assert_eq!(
            String::from_utf8(trzba.to_bytes()).unwrap(),
            concat!(
                r#"<eet:Trzba>"#,
                r#"<eet:Hlavicka uuid_zpravy="e3ac1ba5-1a4e-4e8b-9c46-6a3a0e7c2c7d" dat_odesl="2019-08-11T15:37:52+02:00" prvni_zaslani="true" overeni="false"></eet:Hlavicka>"#,
                r#"<eet:Data dic_popl="CZ00000019" id_provoz="141" id_pokl="1patro-vpravo" porad_cis="141-18543-05" dat_trzby="2019-08-11T15:36:14+02:00" celk_trzba="236.00" zakl_dan1="100.00" dan1="21.00" rezim="0"></eet:Data>"#,
                r#"<eet:KontrolniKody>"#,
                r#"<eet:pkp digest="SHA256" cipher="RSA2048" encoding="base64">3q2+7w==</eet:pkp>"#,
                r#"<eet:bkp digest="SHA1" encoding="base16">D78F8BB9-92A56A59-7F6C7A1F-B918BB78-271367EB</eet:bkp>"#,
                r#"</eet:KontrolniKody>"#,
                r#"</eet:Trzba>"#,
            )
        );
    }

    #[test]
    fn decodes_accepted_confirmation() {
        let odpoved = Element::parse(
            br#"<eet:Odpoved xmlns:eet="http://fs.mfcr.cz/eet/schema/v3">
                <eet:Hlavicka uuid_zpravy="e3ac1ba5-1a4e-4e8b-9c46-6a3a0e7c2c7d" bkp="ABA7EB19-7AD8D753-60ED57B3-9AC9957E-C192030B" dat_prij="2019-08-11T15:37:53+02:00"/>
                <eet:Potvrzeni fik="b3a09b52-7c87-4014-a496-4c7a53cf9120-ff" test="true"/>
                <eet:Varovani kod_varov="1">DIC poplatnika v datove zprave se neshoduje s DIC v certifikatu</eet:Varovani>
            </eet:Odpoved>"#,
        )
        .unwrap();
        let record = confirmation_from_element(&odpoved).unwrap();

        assert_eq!(record.fiscal_code(), Some("b3a09b52-7c87-4014-a496-4c7a53cf9120-ff"));
        assert_eq!(
            record.header.hash_code.as_deref(),
            Some("ABA7EB19-7AD8D753-60ED57B3-9AC9957E-C192030B")
        );
        assert_eq!(
            record.header.received_at.as_ref().unwrap().to_string(),
            "2019-08-11T15:37:53+02:00"
        );
        assert!(record.test);
        assert!(!record.is_error());
        assert_eq!(record.warnings.len(), 1);
        assert_eq!(record.warnings[0].code, 1);
    }

    #[test]
    fn decodes_rejection() {
        let odpoved = Element::parse(
            br#"<Odpoved><Hlavicka dat_odmit="2019-08-11T15:37:53+02:00"/><Chyba kod="-1" test="false">Docasna technicka chyba zpracovani</Chyba></Odpoved>"#,
        )
        .unwrap();
        let record = confirmation_from_element(&odpoved).unwrap();
        assert!(record.is_error());
        assert_eq!(record.error_code(), -1);
        assert!(record.header.message_uuid.is_none());
        assert!(record.header.rejected_at.is_some());
    }

    #[test]
    fn bad_attribute_values_are_invalid_fields() {
        for doc in [
            &br#"<Odpoved><Chyba kod="x"/></Odpoved>"#[..],
            br#"<Odpoved><Potvrzeni fik="f" test="maybe"/></Odpoved>"#,
            br#"<Odpoved><Hlavicka dat_prij="yesterday"/></Odpoved>"#,
        ] {
            let odpoved = Element::parse(doc).unwrap();
            assert!(matches!(
                confirmation_from_element(&odpoved),
                Err(SchemaError::InvalidField { .. })
            ));
        }
    }

    #[test]
    fn confirmation_element_decodes_back() {
        let record = ConfirmationRecord {
            header: ConfirmationHeader {
                message_uuid: Some("e3ac1ba5-1a4e-4e8b-9c46-6a3a0e7c2c7d".into()),
                hash_code: Some("ABA7EB19-7AD8D753-60ED57B3-9AC9957E-C192030B".into()),
                fiscal_code: Some("b3a09b52-7c87-4014-a496-4c7a53cf9120-ff".into()),
                received_at: Some(EetDateTime::parse("2019-08-11T15:37:53+02:00").unwrap()),
                rejected_at: None,
            },
            test: true,
            error: None,
            warnings: vec![Warning {
                code: 3,
                description: "Datum a cas prijeti trzby je vyrazne v budoucnosti".into(),
            }],
        };
        let element = confirmation_to_element(&record);
        assert_eq!(confirmation_from_element(&element).unwrap(), record);
    }
}
