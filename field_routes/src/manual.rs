/*!

This is the long-form manual for `field_routes` and `fieldroutes`.

## Input

The input is a table with one row per event. A row describes a punch-in of an
employee, and possibly a visit to an outlet. The table may come from a CSV
file or from an Excel workbook (`.xlsx`, `.xls`, `.xlsm`, `.ods`). The first
row holds the headers.

```text
Employee Name,Punch In Date,Punch In Time,Punch In Latitude,Punch In Longitude,Outlet Name,Outlet ID,Visit Time,Visit Latitude,Visit Longitude
Asha,10/01/2024,09:00,12.9700,77.5900,Shop 1,S1,09:30,12.9710,77.5910
Asha,10/01/2024,11:00,12.9800,77.6000,Shop 2,S2,11:20,12.9810,77.6010
```

### Columns

The headers do not need to follow a fixed naming. Each column role has a list
of keywords, tried in order. The first header that contains a keyword
(ignoring case) is used for the role.

| role           | keywords                                  | mandatory |
|----------------|-------------------------------------------|-----------|
| `PunchLat`     | `punch in lat`, `latitude`, `lat`         | yes       |
| `PunchLon`     | `punch in long`, `longitude`, `lon`       | yes       |
| `VisitLat`     | `visit lat`, `latitude`, `lat`            | yes       |
| `VisitLon`     | `visit long`, `longitude`, `lon`          | yes       |
| `PunchTime`    | `punch in time`, `time`, `punch_time`     | yes       |
| `VisitTime`    | `visit time`, `time of visit`, `visit_time` | no      |
| `PunchDate`    | `punch in date`, `date`, `punch_date`     | no        |
| `VisitDate`    | `visit date`, `date`, `visit_date`        | no        |
| `EmployeeName` | `employee name`, `name`                   | yes       |
| `OutletName`   | `outlet name`                             | yes       |
| `OutletID`     | `outlet id`                               | yes       |

A file with a single pair of `Latitude`/`Longitude` columns uses them both for
the punches and the visits.

If a mandatory role is not found, the upload is rejected and the error lists
the missing roles along with all the headers of the file. Extra keywords can
be given in the configuration (see below); they are tried before the default
ones.

### Dates and times

All the timestamps are brought to the form `DD-MM-YYYY HH:MM:SS`. A value that
cannot be read becomes `Invalid Time`: the row is kept, and a warning is
reported.

When a date column is found for a timestamp, the date is read from it and the
time of day from the time column. An empty time gives `Invalid Time`, even
when the date is readable. Without a readable date, the time column must hold
a full timestamp. Accepted shapes include `10-01-2024 09:30`,
`10/01/2024 9:30 AM`, `2024-01-10T09:30:00`, `10 Jan 2024 09:30`.

A date like `03-04-2024` is ambiguous. The date convention settles it:
* `day_first` (the default): the 3rd of April. A value that cannot be read
  day first, like `12/25/2024`, is read month first.
* `month_first`: the 4th of March.
* `year_first`: ISO dates such as `2024-04-03`, then day first.
* any other value is a chrono format string for the date, for example
  `%d.%m.%Y`. Nothing else is tried.

Coordinates that are empty or not numbers are treated as absent. They raise
no warning.

## Routes

The routes are computed for the records selected by the filters: an optional
start date and end date (`YYYY-MM-DD`, both inclusive) and an optional
employee name (exact match). Records with an invalid punch time are left out
as soon as a date bound is given.

For each employee, in the order of first appearance in the file:
* the records are sorted by punch time. Records with an invalid punch time
  are not part of the route.
* the route goes from punch location to punch location. Each leg carries its
  haversine distance (mean Earth radius 6371 km), and the total distance is
  the sum of the legs. A leg with a missing coordinate at either end is not
  drawn and not counted.
* a punch marker is drawn once per location and day, a visit marker once per
  location, day and outlet name. The day is the day of the punch.
* the employee gets the next colour of the palette (15 colours by default,
  reused in a loop when there are more employees).

If no record matches the filters, there is no route to draw. This is not an
error.

## Output

`fieldroutes` writes the routes in JSON:

```text
{
  "view": { "center": [12.975, 77.595], "bounds": [[12.97, 77.59], [12.98, 77.6]], "fitBounds": false },
  "routes": [
    {
      "employee": "Asha",
      "color": "#1f77b4",
      "totalDistanceKm": 1.5467,
      "markers": [ { "kind": "punch", "icon": "user-clock", "iconColor": "blue", ... } ],
      "segments": [ { "from": [12.97, 77.59], "to": [12.98, 77.6], "distanceKm": 1.5467, ... } ]
    }
  ],
  "legend": [ { "employee": "Asha", "color": "#1f77b4", "label": "Asha (Dist: 1.55 km)" } ]
}
```

With `--list-employees` or `--list-dates`, it writes the list of employees or
of the days with a valid punch time instead.

## Configuration

`fieldroutes` comes with sensible defaults, which can be changed with a JSON
configuration file. All the fields are optional. The options given on the
command line take precedence.

```text
{
  "inputSettings": {
    "filePath": "visits.csv",
    "provider": "csv",
    "excelWorksheetName": null,
    "dateFormat": "day_first",
    "maxRows": 500000
  },
  "columnKeywords": { "OutletID": ["store code"] },
  "renderSettings": { "palette": ["#1f77b4", ...], "lineWeight": 4, "lineOpacity": 0.7 },
  "filters": { "startDate": "2024-01-10", "endDate": null, "employeeName": null }
}
```

InputSettings:
 - `filePath` (string): the input table. A relative path is relative to the
 directory of the configuration file.
 - `provider` (string, `csv` or `excel`): the format of the input. If not
 provided, it is guessed from the extension of the file.
 - `excelWorksheetName` (string): for Excel inputs, the name of the worksheet.
 The first worksheet is used by default.
 - `dateFormat` (string): the date convention, see above.
 - `maxRows` (number): uploads with more rows are rejected.

`columnKeywords` maps a role name (for example `OutletID` or `outlet_id`) to
extra keywords.

RenderSettings:
 - `palette` (array of strings): at least 15 colours.
 - `lineWeight`, `lineOpacity`: the style of the legs.

 */
